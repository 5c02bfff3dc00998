/// 批量执行协调器集成测试

use std::sync::Arc;

use httptrans::{
    BatchCoordinator, EngineCode, LoopbackEngine, OptionKey, OptionValue, TransferClient,
    TransferError, TransferOutcome,
};

fn engine() -> Arc<LoopbackEngine> {
    Arc::new(LoopbackEngine::new())
}

#[tokio::test]
async fn test_run_executes_every_member() -> Result<(), TransferError> {
    let engine = engine();
    engine.respond("http://ok.test", 200, "ok");
    engine.fail("http://bad.test", EngineCode::TIMED_OUT, "timeout was reached");

    let mut ok_client = TransferClient::with_source(engine.clone(), "http://ok.test");
    let mut bad_client = TransferClient::with_source(engine.clone(), "http://bad.test");

    let mut batch = BatchCoordinator::new(engine.clone());
    batch.attach(&mut ok_client)?;
    batch.attach(&mut bad_client)?;
    assert_eq!(batch.members().len(), 2);

    let results = batch.run().await?;
    assert_eq!(results.len(), 2);

    let ok_handle = ok_client.current_handle().unwrap();
    let bad_handle = bad_client.current_handle().unwrap();

    for result in &results {
        if result.handle == ok_handle {
            match &result.outcome {
                TransferOutcome::Success(payload) => assert_eq!(payload.status, 200),
                other => panic!("expected success for {}, got {:?}", ok_handle, other),
            }
            assert!(result.diagnostics.is_none());
        } else {
            assert_eq!(result.handle, bad_handle);
            assert_eq!(result.outcome, TransferOutcome::Failed);
            let diagnostics = result.diagnostics.as_ref().expect("failed member keeps diagnostics");
            assert_eq!(diagnostics.code, EngineCode::TIMED_OUT);
        }
    }

    Ok(())
}

#[test]
fn test_members_are_registered_with_engine() -> Result<(), TransferError> {
    let engine = engine();
    let mut client = TransferClient::new(engine.clone());

    let mut batch = BatchCoordinator::new(engine.clone());
    batch.attach(&mut client)?;

    let batch_handle = batch.handle()?;
    let member = client.current_handle().unwrap();
    assert_eq!(engine.batch_members(batch_handle), vec![member]);

    Ok(())
}

#[test]
fn test_attach_same_client_twice_is_rejected() -> Result<(), TransferError> {
    let engine = engine();
    let mut client = TransferClient::new(engine.clone());

    let mut batch = BatchCoordinator::new(engine.clone());
    batch.attach(&mut client)?;

    let error = batch.attach(&mut client).unwrap_err();
    assert_eq!(error.error_code(), "MEMBERSHIP_ERROR");
    assert_eq!(batch.members().len(), 1);

    Ok(())
}

#[test]
fn test_client_belongs_to_one_batch_at_a_time() -> Result<(), TransferError> {
    let engine = engine();
    let mut client = TransferClient::new(engine.clone());

    let mut first = BatchCoordinator::new(engine.clone());
    first.attach(&mut client)?;

    // 引擎拒绝把同一个传输句柄编进第二个批次
    let mut second = BatchCoordinator::new(engine.clone());
    let error = second.attach(&mut client).unwrap_err();
    assert_eq!(error.error_code(), "MEMBERSHIP_ERROR");
    assert!(second.members().is_empty());

    Ok(())
}

#[test]
fn test_detach_is_noop_for_non_members() -> Result<(), TransferError> {
    let engine = engine();
    let mut member = TransferClient::new(engine.clone());
    let mut outsider = TransferClient::new(engine.clone());

    let mut batch = BatchCoordinator::new(engine.clone());
    batch.attach(&mut member)?;

    // 不在批次中的客户端：空操作
    batch.detach(&mut outsider)?;
    assert_eq!(batch.members().len(), 1);

    batch.detach(&mut member)?;
    assert!(batch.members().is_empty());
    let batch_handle = batch.handle()?;
    assert!(engine.batch_members(batch_handle).is_empty());

    // 再次移出同一客户端：空操作
    batch.detach(&mut member)?;

    Ok(())
}

#[test]
fn test_option_passthrough_to_batch_handle() -> Result<(), TransferError> {
    let engine = engine();

    let mut batch = BatchCoordinator::new(engine.clone());
    batch.set_option(OptionKey::MaxConcurrency, 4i64);
    let batch_handle = batch.handle()?;

    let applied = engine.applied_options(batch_handle).unwrap();
    assert_eq!(
        applied.get(&OptionKey::MaxConcurrency),
        Some(&OptionValue::Int(4))
    );

    Ok(())
}

#[tokio::test]
async fn test_run_on_empty_batch() -> Result<(), TransferError> {
    let engine = engine();
    let mut batch = BatchCoordinator::new(engine.clone());

    let results = batch.run().await?;
    assert!(results.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_batch_drop_leaves_members_alive() -> Result<(), TransferError> {
    let engine = engine();
    engine.respond("http://example.test", 200, "ok");

    let mut client = TransferClient::with_source(engine.clone(), "http://example.test");
    {
        let mut batch = BatchCoordinator::new(engine.clone());
        batch.attach(&mut client)?;
        assert_eq!(engine.live_handles(), 2);
    }

    // 协调器只释放自己的句柄，成员客户端继续可用
    assert_eq!(engine.live_handles(), 1);
    let payload = client.execute().await?;
    assert_eq!(payload.status, 200);

    Ok(())
}
