use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// 預設過濾規則；設定 `RUST_LOG` 時以環境變數為準
fn default_directives(verbose: bool) -> &'static str {
    if verbose {
        "reservation_etl=debug,info"
    } else {
        "reservation_etl=info,warn"
    }
}

fn env_filter(directives: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives))
}

/// CLI 日誌寫到 stderr，stdout 只留給處理結果
pub fn init_cli_logger(verbose: bool) {
    tracing_subscriber::registry()
        .with(env_filter(default_directives(verbose)))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbose)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .init();
}

pub fn init_lambda_logger() {
    tracing_subscriber::registry()
        .with(env_filter(&format!(
            "{},lambda=info",
            default_directives(false)
        )))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .without_time() // CloudWatch 自帶時間戳
                .json()
                .with_current_span(false),
        )
        .init();
}
