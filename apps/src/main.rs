use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Serialize;
use survey_ledger::mock::{MockProvider, PaillierKeypair};
use survey_ledger::SurveyLedger;
use survey_types::{Identity, SurveyId};
use tokio::sync::Mutex;

/// How often the simulated oracle polls for decryption work.
const ORACLE_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// How long to wait for all reveals before giving up. The core never
/// times out a pending reveal; this deadline belongs to the demo.
const REVEAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Arguments of the survey demo CLI.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Comma-separated names of the items respondents rate.
    #[clap(long, env, value_delimiter = ',', default_value = "espresso,filter")]
    items: Vec<String>,
    /// How long the survey accepts ratings, in seconds.
    #[clap(long, env, default_value_t = 2)]
    duration_secs: u64,
    /// Number of simulated respondents.
    #[clap(long, env, default_value_t = 4)]
    respondents: u64,
    /// Highest rating a respondent may give.
    #[clap(long, env, default_value_t = 5)]
    max_rating: u64,
    /// Print the final tallies as JSON instead of log lines.
    #[clap(long)]
    json: bool,
}

type SharedLedger = Arc<Mutex<SurveyLedger<MockProvider>>>;

#[derive(Serialize)]
struct ItemResult {
    name: String,
    sum: u64,
    average: f64,
}

#[derive(Serialize)]
struct SurveyResult {
    survey_id: SurveyId,
    responses: u64,
    items: Vec<ItemResult>,
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!("Loaded environment variables from {:?}", path),
        Err(e) if e.not_found() => tracing::debug!("No .env file found"),
        Err(e) => bail!("failed to load .env file: {}", e),
    }
    let args = Args::parse();

    let key = PaillierKeypair::demo();
    let ledger: SharedLedger = Arc::new(Mutex::new(SurveyLedger::new(
        MockProvider::new(key),
        Identity::new("survey-ledger"),
    )));

    // The oracle runs as its own thread of control; results arrive out
    // of band whenever it gets around to them.
    let oracle = tokio::spawn(run_oracle(Arc::clone(&ledger), key));

    let admin = Identity::new("admin");
    let deadline_at;
    let survey_id = {
        let mut ledger = ledger.lock().await;
        let id = ledger
            .create_survey(
                "coffee gear survey",
                "rate each machine from 1 to max-rating",
                args.items.clone(),
                args.duration_secs,
                admin.clone(),
                now_secs(),
            )
            .context("failed to create survey")?;
        deadline_at = ledger.survey(id)?.deadline;
        id
    };
    tracing::info!("Created survey {} with items {:?}", survey_id, args.items);

    submit_ratings(&ledger, survey_id, &args, &key).await?;

    // Wait out the deadline, then end the survey. Anyone may do this.
    let remaining = deadline_at.saturating_sub(now_secs());
    tokio::time::sleep(Duration::from_secs(remaining + 1)).await;
    ledger
        .lock()
        .await
        .end_survey(survey_id, now_secs())
        .context("failed to end survey")?;
    tracing::info!("Survey {} ended, requesting reveals", survey_id);

    for item_index in 0..args.items.len() {
        let request_id = ledger
            .lock()
            .await
            .request_reveal(survey_id, item_index)
            .context("failed to request reveal")?;
        tracing::info!("Reveal of item {} pending under {}", item_index, request_id);
    }

    wait_for_reveals(&ledger, survey_id, args.items.len()).await?;

    ledger
        .lock()
        .await
        .finalize(survey_id, &admin)
        .context("failed to finalize survey")?;
    oracle.abort();

    report(&ledger, survey_id, &args).await
}

/// Simulated respondents encrypt one rating per item client-side and
/// submit the ciphertexts with their validity proofs.
async fn submit_ratings(
    ledger: &SharedLedger,
    survey_id: SurveyId,
    args: &Args,
    key: &PaillierKeypair,
) -> Result<()> {
    for r in 0..args.respondents {
        let respondent = Identity::new(format!("respondent-{r}"));
        let values: Vec<u64> = (0..args.items.len() as u64)
            .map(|i| (r + i) % args.max_rating + 1)
            .collect();
        let (ciphertexts, proofs): (Vec<_>, Vec<_>) =
            values.iter().map(|v| key.encrypt(*v)).unzip();

        ledger
            .lock()
            .await
            .submit_ratings(survey_id, &respondent, &ciphertexts, &proofs, now_secs())
            .with_context(|| format!("submission by {respondent} rejected"))?;
        tracing::info!("{} submitted {} encrypted ratings", respondent, values.len());
    }
    Ok(())
}

/// The oracle side: drains decryption jobs from the provider, opens
/// each ciphertext with the private key, and delivers the plaintext
/// back through the ledger's callback entry point.
async fn run_oracle(ledger: SharedLedger, key: PaillierKeypair) {
    loop {
        let jobs = ledger.lock().await.provider_mut().take_jobs();
        for job in jobs {
            let plaintext = key.decrypt_raw(job.ciphertext).to_le_bytes();
            match ledger.lock().await.apply_result(job.request_id, &plaintext) {
                Ok(outcome) => tracing::info!("Oracle delivered {}: {:?}", job.request_id, outcome),
                Err(err) => tracing::warn!("Oracle delivery of {} failed: {}", job.request_id, err),
            }
        }
        tokio::time::sleep(ORACLE_POLL_INTERVAL).await;
    }
}

async fn wait_for_reveals(
    ledger: &SharedLedger,
    survey_id: SurveyId,
    item_count: usize,
) -> Result<()> {
    let give_up = tokio::time::Instant::now() + REVEAL_TIMEOUT;
    loop {
        let revealed = {
            let ledger = ledger.lock().await;
            (0..item_count).all(|i| ledger.decrypted_sum(survey_id, i).is_ok())
        };
        if revealed {
            return Ok(());
        }
        if tokio::time::Instant::now() >= give_up {
            bail!("oracle never delivered all reveal results");
        }
        tokio::time::sleep(ORACLE_POLL_INTERVAL).await;
    }
}

async fn report(ledger: &SharedLedger, survey_id: SurveyId, args: &Args) -> Result<()> {
    let mut ledger = ledger.lock().await;
    for event in ledger.drain_events() {
        tracing::debug!("event: {:?}", event);
    }

    let responses = ledger.survey(survey_id)?.response_count;
    let mut items = Vec::with_capacity(args.items.len());
    for (item_index, name) in args.items.iter().enumerate() {
        let sum = ledger.decrypted_sum(survey_id, item_index)?;
        items.push(ItemResult {
            name: name.clone(),
            sum,
            average: sum as f64 / responses as f64,
        });
    }
    let result = SurveyResult {
        survey_id,
        responses,
        items,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        for item in &result.items {
            tracing::info!(
                "Item {:?}: sum {} over {} responses, average {:.2}",
                item.name,
                item.sum,
                result.responses,
                item.average
            );
        }
    }
    Ok(())
}
