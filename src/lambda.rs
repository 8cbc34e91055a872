use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use reservation_etl::utils::logger;
use reservation_etl::{EtlEngine, LambdaConfig, S3Event, S3Storage};
use serde::Serialize;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectSummary {
    pub bucket: String,
    pub key: String,
    pub records_succeeded: usize,
    pub records_failed: usize,
}

#[derive(Serialize)]
pub struct Response {
    pub message: String,
    pub objects: Vec<ObjectSummary>,
}

async fn function_handler(
    engine: &EtlEngine<S3Storage>,
    event: LambdaEvent<S3Event>,
) -> Result<Response, Error> {
    tracing::info!(
        request_id = %event.context.request_id,
        "Received notification with {} record(s)",
        event.payload.records.len()
    );

    let reports = engine
        .handle_event(&event.payload)
        .await
        .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)?;

    // 個別記錄失敗只寫入日誌，呼叫端仍收到 Done
    let objects = reports
        .iter()
        .map(|report| ObjectSummary {
            bucket: report.source_bucket.clone(),
            key: report.source_key.clone(),
            records_succeeded: report.succeeded(),
            records_failed: report.failed(),
        })
        .collect();

    Ok(Response {
        message: "Done".to_string(),
        objects,
    })
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    logger::init_lambda_logger();

    // S3 client 與 engine 只建立一次，所有 invocation 共用
    let config = LambdaConfig::from_env()?;
    let client = config.s3_client().await;
    let engine = EtlEngine::new(S3Storage::new(client), config.processor.clone());
    let engine = &engine;

    run(service_fn(move |event: LambdaEvent<S3Event>| async move {
        function_handler(engine, event).await
    }))
    .await
}
