/// 单次传输客户端集成测试
///
/// 全部用回环引擎驱动公共 API：建连与选项回放、一次性选项叠加、
/// 错误翻译、自省与暂停。

use std::sync::Arc;

use httptrans::{
    ConnectionState, EngineCall, EngineCode, InfoKey, LoopbackEngine, OptionKey, OptionValue,
    PauseState, TransferClient, TransferEngine, TransferError,
};

fn engine() -> Arc<LoopbackEngine> {
    Arc::new(LoopbackEngine::new())
}

#[tokio::test]
async fn test_first_execute_does_init_replay_perform() -> Result<(), TransferError> {
    let engine = engine();
    engine.respond("http://example.test", 200, "hello");

    let mut client = TransferClient::with_source(engine.clone(), "http://example.test");
    let payload = client.execute().await?;

    assert_eq!(payload.status, 200);
    assert_eq!(&payload.body[..], b"hello");

    // 恰好一次 init、每个已存选项一次 applyOption、一次 perform
    let handle = client.current_handle().unwrap();
    assert_eq!(
        engine.calls(),
        vec![
            EngineCall::Init(handle),
            EngineCall::ApplyOption(handle, OptionKey::Url),
            EngineCall::Perform(handle),
        ]
    );

    // 成功之后元数据可读
    let metadata = client.info()?.expect("connected client has metadata");
    assert_eq!(metadata.get(&InfoKey::ResponseCode), Some(&serde_json::json!(200)));
    assert_eq!(
        metadata.get(&InfoKey::EffectiveUrl),
        Some(&serde_json::json!("http://example.test"))
    );

    Ok(())
}

#[test]
fn test_info_is_absent_before_first_connect() -> Result<(), TransferError> {
    let client = TransferClient::new(engine());
    assert!(client.info()?.is_none());
    assert!(client.info_field(InfoKey::ResponseCode)?.is_none());

    Ok(())
}

#[tokio::test]
async fn test_failed_transfer_carries_handle_diagnostics() {
    let engine = engine();
    engine.fail("http://broken.test", EngineCode::COULD_NOT_CONNECT, "connection refused");

    let mut client = TransferClient::with_source(engine.clone(), "http://broken.test");
    let error = client.execute().await.unwrap_err();

    match &error {
        TransferError::Transfer { message, code } => {
            assert_eq!(message, "connection refused");
            assert_eq!(*code, EngineCode::COULD_NOT_CONNECT);
        }
        other => panic!("expected transfer error, got {:?}", other),
    }

    // 错误携带的结果码与失败当时句柄上的诊断一致
    let handle = client.current_handle().unwrap();
    let diagnostics = engine.diagnostics(handle);
    assert_eq!(error.code(), Some(diagnostics.code));
    assert_eq!(diagnostics.message, "connection refused");
}

#[tokio::test]
async fn test_unrouted_url_fails_with_resolve_code() {
    let engine = engine();
    let mut client = TransferClient::with_source(engine, "http://nowhere.test");

    let error = client.execute().await.unwrap_err();
    assert_eq!(error.code(), Some(EngineCode::COULD_NOT_RESOLVE));
    assert!(error.to_string().contains("nowhere.test"));
}

#[tokio::test]
async fn test_overlay_is_restored_on_success() -> Result<(), TransferError> {
    let engine = engine();
    engine.respond("http://base.test", 200, "base");
    engine.respond("http://overlay.test", 200, "overlay");

    let mut client = TransferClient::with_source(engine, "http://base.test");
    client.set_option(OptionKey::UserAgent, "base-agent");

    let payload = client.execute_with("http://overlay.test").await?;
    assert_eq!(&payload.body[..], b"overlay");

    // 执行结束后持久选项原样恢复
    assert_eq!(
        client.option(OptionKey::Url).and_then(OptionValue::as_str),
        Some("http://base.test")
    );
    assert_eq!(
        client.option(OptionKey::UserAgent).and_then(OptionValue::as_str),
        Some("base-agent")
    );

    Ok(())
}

#[tokio::test]
async fn test_overlay_is_restored_on_failure() {
    let engine = engine();
    engine.respond("http://base.test", 200, "base");
    engine.fail("http://bad.test", EngineCode::TIMED_OUT, "timeout was reached");

    let mut client = TransferClient::with_source(engine, "http://base.test");
    let error = client.execute_with("http://bad.test").await.unwrap_err();
    assert_eq!(error.code(), Some(EngineCode::TIMED_OUT));

    // 失败路径同样恢复
    assert_eq!(
        client.option(OptionKey::Url).and_then(OptionValue::as_str),
        Some("http://base.test")
    );
}

#[tokio::test]
async fn test_overlay_single_entry_and_other_client() -> Result<(), TransferError> {
    let engine = engine();
    engine.respond("http://a.test", 200, "a");
    engine.respond("http://b.test", 201, "b");

    let mut donor = TransferClient::with_source(engine.clone(), "http://b.test");
    donor.set_option(OptionKey::UserAgent, "donor");

    let mut client = TransferClient::with_source(engine, "http://a.test");

    // 叠加另一客户端的全部选项
    let payload = client.execute_with(&donor).await?;
    assert_eq!(payload.status, 201);
    assert_eq!(
        client.option(OptionKey::Url).and_then(OptionValue::as_str),
        Some("http://a.test")
    );

    // 叠加单个键值对
    let payload = client
        .execute_with((OptionKey::Url, OptionValue::Str("http://b.test".into())))
        .await?;
    assert_eq!(payload.status, 201);

    Ok(())
}

#[tokio::test]
async fn test_option_changes_apply_on_reused_handle() -> Result<(), TransferError> {
    let engine = engine();
    engine.respond("http://first.test", 200, "first");
    engine.respond("http://second.test", 200, "second");

    let mut client = TransferClient::with_source(engine.clone(), "http://first.test");
    client.execute().await?;
    let handle = client.current_handle().unwrap();

    // 句柄存活期间改选项，重新执行时必须生效
    client.set_option(OptionKey::Url, "http://second.test");
    let payload = client.execute().await?;
    assert_eq!(&payload.body[..], b"second");
    assert_eq!(client.current_handle(), Some(handle));

    // 自始至终只 init 过一次
    let inits = engine
        .calls()
        .iter()
        .filter(|call| matches!(call, EngineCall::Init(_)))
        .count();
    assert_eq!(inits, 1);

    Ok(())
}

#[test]
fn test_clone_starts_disconnected_with_same_options() -> Result<(), TransferError> {
    let engine = engine();
    engine.respond("http://example.test", 200, "ok");

    let mut client = TransferClient::with_source(engine, "http://example.test");
    client.set_option(OptionKey::UserAgent, "original");
    client.connect()?;

    let mut cloned = client.clone();
    assert_eq!(cloned.state(), ConnectionState::Disconnected);
    assert!(cloned.current_handle().is_none());
    assert_eq!(cloned.options(), client.options());

    // 改动克隆体的选项不影响原客户端
    cloned.set_option(OptionKey::UserAgent, "clone");
    assert_eq!(
        client.option(OptionKey::UserAgent).and_then(OptionValue::as_str),
        Some("original")
    );

    Ok(())
}

#[tokio::test]
async fn test_disconnect_twice_is_noop() -> Result<(), TransferError> {
    let engine = engine();
    engine.respond("http://example.test", 200, "ok");

    let mut client = TransferClient::with_source(engine.clone(), "http://example.test");
    client.execute().await?;

    client.disconnect()?;
    assert_eq!(client.state(), ConnectionState::Disconnected);

    // 第二次断开不得再触发引擎 close
    client.disconnect()?;
    let closes = engine
        .calls()
        .iter()
        .filter(|call| matches!(call, EngineCall::Close(_)))
        .count();
    assert_eq!(closes, 1);

    Ok(())
}

#[test]
fn test_drop_releases_engine_handle() -> Result<(), TransferError> {
    let engine = engine();
    engine.respond("http://example.test", 200, "ok");

    {
        let mut client = TransferClient::with_source(engine.clone(), "http://example.test");
        client.connect()?;
        assert_eq!(engine.live_handles(), 1);
    }

    assert_eq!(engine.live_handles(), 0);

    Ok(())
}

#[test]
fn test_pause_before_connect_is_noop() -> Result<(), TransferError> {
    let engine = engine();
    let mut client = TransferClient::new(engine.clone());

    // 从未连接：不报错，也不触发任何引擎调用
    client.pause(PauseState::AllPaused)?;
    assert!(engine.calls().is_empty());

    Ok(())
}

#[test]
fn test_pause_failure_reads_static_table() -> Result<(), TransferError> {
    let engine = engine();
    engine.respond("http://example.test", 200, "ok");

    let mut client = TransferClient::with_source(engine.clone(), "http://example.test");
    client.connect()?;

    engine.script_pause_result(EngineCode::BAD_OPTION);
    let error = client.pause(PauseState::AllPaused).unwrap_err();
    match &error {
        TransferError::Pause { code } => assert_eq!(*code, EngineCode::BAD_OPTION),
        other => panic!("expected pause error, got {:?}", other),
    }
    // 消息来自静态描述表，而不是句柄诊断
    assert!(error.to_string().contains("invalid option or value"));

    // 未预置失败时暂停生效
    client.pause(PauseState::RecvPaused)?;
    let handle = client.current_handle().unwrap();
    assert_eq!(engine.pause_state(handle), Some(PauseState::RecvPaused));

    client.resume()?;
    assert_eq!(engine.pause_state(handle), Some(PauseState::Running));

    Ok(())
}

#[test]
fn test_with_source_inherits_from_other_client() {
    let engine = engine();
    let mut donor = TransferClient::with_source(engine.clone(), "http://example.test");
    donor.set_option(OptionKey::FollowRedirects, true);

    let derived = TransferClient::with_source(engine, &donor);
    assert_eq!(derived.options(), donor.options());
    assert_eq!(derived.state(), ConnectionState::Disconnected);
}
