/// 单次传输演示
///
/// 用回环引擎扮演原生传输引擎，走一遍配置、执行与自省的完整流程。

use std::sync::Arc;

use httptrans::{InfoKey, LoopbackEngine, OptionKey, TransferClient};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let engine = Arc::new(LoopbackEngine::new());
    engine.respond("http://example.test/hello", 200, "hello from the engine");

    // 地址简写直接落到 Url 选项槽位
    let mut client = TransferClient::with_source(engine, "http://example.test/hello");
    client.set_option(OptionKey::UserAgent, "httptrans-demo/0.1");

    match client.execute().await {
        Ok(payload) => {
            println!("status: {}", payload.status);
            println!("body: {}", String::from_utf8_lossy(&payload.body));
        }
        Err(error) => {
            eprintln!("transfer failed: {}", error);
            return;
        }
    }

    if let Ok(Some(value)) = client.info_field(InfoKey::TotalTime) {
        println!("total time: {}s", value);
    }
}
