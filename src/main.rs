use clap::Parser;
use reservation_etl::utils::error::{ErrorSeverity, EtlError};
use reservation_etl::utils::{logger, validation::Validate};
use reservation_etl::{CliConfig, EtlEngine, LocalStorage, ObjectLocation};

fn exit_code(e: &EtlError) -> i32 {
    match e.severity() {
        ErrorSeverity::Low => 0,      // 警告，但成功
        ErrorSeverity::Medium => 2,   // 可重試
        ErrorSeverity::High => 1,     // 處理錯誤
        ErrorSeverity::Critical => 3, // 配置或系統錯誤
    }
}

fn fail(e: &EtlError) -> ! {
    tracing::error!(
        "❌ Reservation ETL failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 建議: {}", e.recovery_suggestion());
    std::process::exit(exit_code(e));
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = CliConfig::parse();

    // 初始化日誌
    logger::init_cli_logger(config.verbose);

    tracing::info!("Starting reservation-etl CLI");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    if let Err(e) = config.validate() {
        fail(&e);
    }
    let processor = match config.processor_config() {
        Ok(processor) => processor,
        Err(e) => fail(&e),
    };

    let storage = LocalStorage::new(&config.storage_root);
    let engine = EtlEngine::new(storage, processor);
    let location = ObjectLocation {
        bucket: config.bucket.clone(),
        key: config.key.clone(),
    };

    match engine.process_object(&location).await {
        Ok(report) => {
            for receipt in report.receipts() {
                println!("📁 {} ({} bytes)", receipt.destination, receipt.bytes_written);
            }
            if !report.is_complete_success() {
                for failure in report.failures() {
                    eprintln!("⚠️  {}", failure);
                }
            }
            // 部分記錄失敗仍視為完成
            println!(
                "✅ Done: {} reservation(s) written, {} failed",
                report.succeeded(),
                report.failed()
            );
        }
        Err(e) => fail(&e),
    }

    Ok(())
}
