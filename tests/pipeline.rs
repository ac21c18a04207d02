//! End-to-end tests of the interception pipeline: dispatch, detection, synthesis and
//! loopback injection, with recording stand-ins for the host's UI.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use wirescope::{
    config::{PipelineConfig, DEFAULT_PUSH_COMMAND},
    crypto::Sealer,
    dispatch::Envelope,
    handlers::{
        ComposeRequest, ComposeSlot, ContentComposer, DecryptRequest, HostIdentity, PendingSend,
        GROUP_MSG_COMMAND, LONG_MSG_COMMAND, RKEY_COMMAND, SEND_MSG_COMMAND,
    },
    longmsg::ContentMode,
    pipeline::Pipeline,
    store::{ConfigStore, JsonFileStore},
    synth::{AppendSlot, PacketSynthesizer, PacketTemplate, Substitutions},
    tree::{json, TreeValue},
    ui::{InlineThread, Notifier, ToastKind, TreeViewer, Ui, ViewerKind},
    wire, Error,
};

#[derive(Default)]
struct Screen {
    toasts: Mutex<Vec<(ToastKind, String)>>,
    viewers: Mutex<Vec<ViewerKind>>,
}

impl Notifier for Screen {
    fn toast(&self, kind: ToastKind, message: &str) {
        self.toasts.lock().unwrap().push((kind, message.to_string()));
    }
}

impl TreeViewer for Screen {
    fn show(&self, kind: ViewerKind, _tree: &TreeValue) {
        self.viewers.lock().unwrap().push(kind);
    }
}

fn ui(screen: &Arc<Screen>) -> Ui {
    Ui::new(Arc::new(InlineThread), screen.clone(), screen.clone())
}

struct Account;

impl HostIdentity for Account {
    fn current_uin(&self) -> i64 {
        10001
    }

    fn uid_for_uin(&self, _uin: i64) -> String {
        "u_self".to_string()
    }

    fn uin_for_uid(&self, _uid: &str) -> Option<i64> {
        Some(20002)
    }
}

fn envelope(command: &str, json_text: &str) -> Envelope {
    let _ = env_logger::builder().is_test(true).try_init();
    let payload = wire::encode(&json::parse(json_text).unwrap()).unwrap();
    Envelope::push(command, payload)
}

#[test]
fn gray_tip_event_is_cached() {
    let pipeline = Pipeline::builder().build();
    let report = pipeline.on_dispatch(&envelope(
        DEFAULT_PUSH_COMMAND,
        r#"{"25": {"1": {"28": {"2": "Alice 拍了拍 Bob"}, "20": {"1": 111, "2": 222}}}}"#,
    ));
    assert!(report.decoded());

    let event = pipeline.last_event().latest().unwrap();
    assert_eq!(event.text(), "Alice 拍了拍 Bob");
    assert_eq!(event.info.hit_reason_tag(), "grayTips(25.1.28.2)");
    assert_eq!(event.info.from.as_deref(), Some("111"));
    assert_eq!(event.info.to.as_deref(), Some("222"));
    assert_eq!(event.command, DEFAULT_PUSH_COMMAND);
}

#[test]
fn marker_element_inside_sequence() {
    let pipeline = Pipeline::builder().build();
    pipeline.on_dispatch(&envelope(
        DEFAULT_PUSH_COMMAND,
        r#"{"1": {"3": {"1": {"2": [{"5": 1}, {"49": {"1": 3, "2": 7}}]}}}}"#,
    ));
    let event = pipeline.last_event().latest().unwrap();
    assert_eq!(event.text(), "(type=3,count=7)");

    // unrelated traffic leaves the slot alone
    pipeline.on_dispatch(&envelope(DEFAULT_PUSH_COMMAND, r#"{"1": {"2": "hello"}}"#));
    assert_eq!(pipeline.last_event().latest().unwrap().text(), "(type=3,count=7)");
}

#[test]
fn handlers_run_in_order_despite_failures() {
    let pipeline = Pipeline::builder().build();
    let order = Arc::new(Mutex::new(Vec::new()));

    for name in ["h1", "h2", "h3"] {
        let order = Arc::clone(&order);
        pipeline.dispatcher().register_fn("X", name, move |_, _| {
            order.lock().unwrap().push(name);
            if name == "h2" {
                return Err(Error::Error("h2 refuses".to_string()));
            }
            Ok(())
        });
    }
    pipeline.dispatcher().register_fn("X", "h4", |_, _| panic!("h4 panics"));

    let report = pipeline.on_dispatch(&envelope("X", r#"{"1": 1}"#));
    assert_eq!(*order.lock().unwrap(), ["h1", "h2", "h3"]);
    assert_eq!(report.invoked, 2);
    assert_eq!(report.failed, ["h2", "h4"]);
}

#[test]
fn truncated_payload_reaches_handlers_as_none() {
    let pipeline = Pipeline::builder().build();
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);
    pipeline.dispatcher().register_fn("X", "observer", move |tree, _| {
        assert!(tree.is_none());
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    // field 1, length-delimited, declares 5 bytes but carries 2
    let report = pipeline.on_dispatch(&Envelope::push("X", vec![0x0A, 0x05, 0x41, 0x42]));
    assert_eq!(seen.load(Ordering::SeqCst), 1);
    assert!(!report.decoded());
    assert!(report.decode_error.as_ref().is_some_and(Error::is_decode_error));
    assert!(pipeline.last_event().latest().is_none());
}

#[test]
fn template_content_is_appended() {
    let template = PacketTemplate::new("t", r#"{"1": ${x}, "2": [{"1": 1}]}"#);
    let synth = PacketSynthesizer::with_slot(AppendSlot::new("2"));
    let tree = synth
        .render(
            &template,
            &Substitutions::new().raw("x", "1"),
            Some(json::parse(r#"{"2": 2}"#).unwrap()),
        )
        .unwrap();
    assert_eq!(
        json::to_json(&tree).unwrap(),
        serde_json::json!({"1": 1, "2": [{"1": 1}, {"2": 2}]})
    );
}

#[test]
fn rkey_refresh() {
    let pipeline = Pipeline::builder().build();
    pipeline.on_dispatch(&envelope(
        RKEY_COMMAND,
        r#"{"4": {"4": {"1": [{"1": "&rkey=G"}, {"1": "&rkey=P"}]}}}"#,
    ));
    assert_eq!(pipeline.rkeys().group().as_deref(), Some("&rkey=G"));
    assert_eq!(pipeline.rkeys().private().as_deref(), Some("&rkey=P"));
}

#[test]
fn send_echo_loops_back_and_persists_counter() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store: Arc<dyn ConfigStore> =
        Arc::new(JsonFileStore::open(dir.path().join("settings.json")).unwrap());
    let pipeline = Pipeline::builder()
        .with_store(Arc::clone(&store))
        .with_identity(Arc::new(Account))
        .build();

    let pushed = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&pushed);
    pipeline
        .dispatcher()
        .register_fn(DEFAULT_PUSH_COMMAND, "push-observer", move |tree, _| {
            sink.lock().unwrap().push(tree.cloned());
            Ok(())
        });

    let fixer = pipeline.send_fixer().unwrap();
    fixer.set_enabled(true);
    fixer
        .pending()
        .push(PendingSend::new("u_peer", r#"{"1": {"1": "hi there"}}"#));

    pipeline.on_dispatch(&envelope(SEND_MSG_COMMAND, r#"{"1": 0, "3": 1700000000, "14": 77}"#));

    let pushed = pushed.lock().unwrap();
    assert_eq!(pushed.len(), 2);
    let message = pushed[1].as_ref().unwrap();
    let elements = message.at("1.3.1.2").and_then(TreeValue::as_sequence).unwrap();
    assert_eq!(elements.len(), 3);
    assert_eq!(elements[2].at("1.1").and_then(TreeValue::as_str), Some("hi there"));
    assert_eq!(message.at("1.2.28").and_then(TreeValue::as_i64), Some(1_000_000));

    assert_eq!(pipeline.counter().current(), 1_000_001);
    let reopened = JsonFileStore::open(dir.path().join("settings.json")).unwrap();
    assert_eq!(reopened.get_int("packet.sequence"), Some(1_000_001));
}

#[test]
fn sealed_group_message_is_opened() {
    let screen = Arc::new(Screen::default());
    let pipeline = Pipeline::builder().with_ui(ui(&screen)).build();

    let inner = json::parse(
        r#"{"1": {"2": [{"1": {"1": "a"}}, {"1": {"1": "b"}}, {"1": {"1": "the plaintext"}}]}}"#,
    )
    .unwrap();
    let sealed = Sealer::default()
        .seal("ono", &wire::encode(&inner).unwrap())
        .unwrap();
    let response = format!(
        r#"{{"6": {{"3": {{"1": {{"2": [{{"1": 0}}, {{"1": 0}}, {{"1": {{"12": {{"1": "{}"}}}}}}]}}}}}}}}"#,
        json::encode_hex_scalar(&sealed)
    );

    pipeline
        .opener()
        .arm(DecryptRequest::new("g1", "5", "10001"));
    pipeline.on_dispatch(&envelope(GROUP_MSG_COMMAND, &response));
    assert_eq!(
        pipeline.overrides().get("g1:5:10001").as_deref(),
        Some("the plaintext")
    );
    assert_eq!(screen.toasts.lock().unwrap()[0].0, ToastKind::Success);

    // a second, unarmed fetch is just shown
    pipeline.on_dispatch(&envelope(GROUP_MSG_COMMAND, &response));
    assert_eq!(*screen.viewers.lock().unwrap(), [ViewerKind::FetchResult]);
}

#[test]
fn long_message_content_reaches_composer() {
    let composer = Arc::new(ComposeSlot::new());
    let pipeline = Pipeline::builder()
        .with_config(PipelineConfig::new().with_pattern_detection(false))
        .with_composer(composer.clone())
        .build();

    composer.request_content(ComposeRequest::new(ContentMode::JsonCard).with_texts("[聊天记录]", "hello"));
    pipeline.on_dispatch(&envelope(LONG_MSG_COMMAND, r#"{"2": {"3": "resid-1"}}"#));

    let (mode, content) = composer.take_content().unwrap();
    assert_eq!(mode, ContentMode::JsonCard);
    assert!(content.at("51.1").is_some());
    assert!(composer.request().is_none());
}
