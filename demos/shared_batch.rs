/// 共享池与批量执行演示
///
/// 两个客户端共享同一份 Cookie 与 DNS 缓存，再被编进同一个批次并发执行。

use std::sync::Arc;

use httptrans::{
    BatchCoordinator, LoopbackEngine, SharedPool, SharedResource, TransferClient, TransferOutcome,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let engine = Arc::new(LoopbackEngine::new());
    engine.respond("http://example.test/a", 200, "payload a");
    engine.respond("http://example.test/b", 200, "payload b");

    let mut pool = SharedPool::with_resources(
        engine.clone(),
        [SharedResource::Cookies, SharedResource::DnsCache],
    )
    .expect("share pool setup");

    let mut first = TransferClient::with_source(engine.clone(), "http://example.test/a");
    let mut second = TransferClient::with_source(engine.clone(), "http://example.test/b");
    pool.attach([&mut first, &mut second]).expect("attach clients");

    let mut batch = BatchCoordinator::new(engine.clone());
    batch.attach(&mut first).expect("attach first");
    batch.attach(&mut second).expect("attach second");

    let results = batch.run().await.expect("batch run");
    for result in results {
        match result.outcome {
            TransferOutcome::Success(payload) => {
                println!("{}: {}", result.handle, String::from_utf8_lossy(&payload.body));
            }
            TransferOutcome::Failed => {
                let diagnostics = result.diagnostics.expect("failed member has diagnostics");
                println!("{}: failed, {}", result.handle, diagnostics.message);
            }
        }
    }
}
