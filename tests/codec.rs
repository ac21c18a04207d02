//! Wire format and scanner properties over captured message shapes.

use std::{cell::RefCell, rc::Rc};

use wirescope::{
    config::DecodeConfig,
    scanner::PatternScanner,
    tree::{
        json,
        node::{Node, NodeKind, Segment},
        Scalar, TreeValue,
    },
    wire,
};

/// Message shapes seen on the wire, as JSON.
const SHAPES: &[&str] = &[
    r#"{"1": 150}"#,
    r#"{"1": {"1": {"1": 10001, "2": "u_abc"}, "2": {"1": 166, "6": 1700000000}}}"#,
    r#"{"3": [1, 2, 3], "4": "text with\ttab", "5": "hex->00ff10"}"#,
    r#"{"25": {"1": {"28": {"2": "Alice 拍了拍 Bob"}, "20": {"1": 1, "2": 2}}}}"#,
    r#"{"1": {"3": {"1": {"2": [{"1": {"1": "hi"}}, {"49": {"1": 3, "2": 7}}]}}}}"#,
    r#"{"6": {"3": {"1": {"2": [{"1": 0}, {"1": {"12": {"1": "hex->00114514deadbeef"}}}]}}}}"#,
];

#[test]
fn decode_encode_decode_is_stable() {
    for shape in SHAPES {
        let bytes = wire::encode(&json::parse(shape).unwrap()).unwrap();
        let first = wire::decode(&bytes).unwrap();
        let again = wire::decode(&wire::encode(&first).unwrap()).unwrap();
        assert_eq!(first, again, "{shape}");
    }
}

#[test]
fn overlong_varints_settle_after_one_reencoding() {
    // field 1 = message { field 5 varint 48 spelled 0xB0 0x00 }
    let bytes = [0x0A, 0x03, 0x28, 0xB0, 0x00];
    let tree = wire::decode(&bytes).unwrap();
    assert_eq!(tree.at("1.5").and_then(TreeValue::as_i64), Some(48));

    let canonical = wire::decode(&wire::encode(&tree).unwrap()).unwrap();
    // the canonical payload "(0" now reads as text
    assert_eq!(canonical.at("1").and_then(TreeValue::as_str), Some("(0"));
    let reencoded = wire::encode(&canonical).unwrap();
    assert_eq!(reencoded, [0x0A, 0x02, 0x28, 0x30]);
    assert_eq!(wire::decode(&reencoded).unwrap(), canonical);
}

#[test]
fn wire_types_survive_reencoding() {
    // field 1 fixed32 = 1, field 2 fixed64 = 2, field 3 varint = 300
    let bytes = [
        0x0D, 0x01, 0x00, 0x00, 0x00, 0x11, 0x02, 0, 0, 0, 0, 0, 0, 0, 0x18, 0xAC, 0x02,
    ];
    let tree = wire::decode(&bytes).unwrap();
    assert_eq!(tree.at("1").and_then(TreeValue::as_scalar), Some(&Scalar::Fixed32(1)));
    assert_eq!(tree.at("2").and_then(TreeValue::as_scalar), Some(&Scalar::Fixed64(2)));
    assert_eq!(tree.at("3").and_then(TreeValue::as_i64), Some(300));
    assert_eq!(wire::encode(&tree).unwrap(), bytes);
}

#[test]
fn depth_bound_keeps_deep_payloads_raw() {
    let nested = json::parse(r#"{"1": {"1": {"1": {"1": 5}}}}"#).unwrap();
    let bytes = wire::encode(&nested).unwrap();

    let shallow = wire::decode_with(&bytes, &DecodeConfig::new().with_max_depth(3)).unwrap();
    assert!(shallow.at("1.1.1.1").is_none());
    assert!(matches!(
        shallow.at("1.1.1").and_then(TreeValue::as_scalar),
        Some(Scalar::Bytes(_))
    ));
    assert_eq!(
        wire::decode(&bytes).unwrap().at("1.1.1.1").and_then(TreeValue::as_i64),
        Some(5)
    );
}

#[test]
fn malformed_inputs_fail_cleanly() {
    let cases: &[&[u8]] = &[
        &[0x0A, 0x05, 0x41],
        &[0x0B],
        &[0x08, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01],
        &[0x0D, 0x01, 0x02],
    ];
    for case in cases {
        let error = wire::decode(case).unwrap_err();
        assert!(error.is_decode_error(), "{case:02x?}: {error}");
    }
}

#[test]
fn detection_is_deterministic() {
    let scanner = PatternScanner::default();
    for shape in SHAPES {
        let tree = wire::decode(&wire::encode(&json::parse(shape).unwrap()).unwrap()).unwrap();
        assert_eq!(scanner.extract(&tree), scanner.extract(&tree));
        assert_eq!(scanner.detect(&tree), scanner.extract(&tree).is_some());
    }
}

#[test]
fn marker_hit_reads_identifier_siblings() {
    let tree = json::parse(
        r#"{"1": [{"1": {"1": "hi"}}, {"49": {"1": 3, "2": 7}, "fromUin": 111, "toUin": 222}]}"#,
    )
    .unwrap();
    let info = PatternScanner::default().extract(&tree).unwrap();

    assert_eq!(info.hit_reason_tag(), "elem49(1.1)");
    assert_eq!(info.text.as_deref(), Some("hi"));
    assert_eq!(info.from.as_deref(), Some("111"));
    assert_eq!(info.to.as_deref(), Some("222"));
    assert!(info.extras.iter().any(|(path, value)| path == "49.2" && value == "7"));
}

#[test]
fn keyword_hit_reads_identifiers_of_its_parent() {
    let tree = json::parse(
        r#"{"1": {"2": [
            {"1": "hello"},
            {"5": {"1": "Alice 拍了拍 Bob", "peerId": "u_peer", "senderUin": 111}}
        ]}}"#,
    )
    .unwrap();
    let info = PatternScanner::default().extract(&tree).unwrap();

    assert_eq!(info.hit_reason_tag(), "keyword(拍了拍)");
    assert_eq!(info.source, "1.2.1.5.1");
    // no key names a direction: the first identifier is the sender, the next the target
    assert_eq!(info.from.as_deref(), Some("u_peer"));
    assert_eq!(info.to.as_deref(), Some("111"));

    let directed = json::parse(
        r#"{"1": {"1": "A 拍了拍 B", "toUin": "222", "peerId": "x", "fromUin": "111"}}"#,
    )
    .unwrap();
    let info = PatternScanner::default().extract(&directed).unwrap();
    assert_eq!(info.from.as_deref(), Some("111"));
    assert_eq!(info.to.as_deref(), Some("222"));
}

fn put_varint(out: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        out.push((value as u8) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

#[test]
fn wide_messages_decode_in_linear_time() {
    let fields = 40_000_u64;
    let mut bytes = Vec::new();
    for field in 1..=fields {
        put_varint(&mut bytes, field << 3);
        put_varint(&mut bytes, field);
    }
    // one repeated occurrence at the end folds into the first position
    put_varint(&mut bytes, 1 << 3);
    put_varint(&mut bytes, 0);

    let started = std::time::Instant::now();
    let tree = wire::decode(&bytes).unwrap();
    let elapsed = started.elapsed();

    let mapping = tree.as_mapping().unwrap();
    assert_eq!(mapping.len(), fields as usize);
    assert_eq!(mapping.keys().nth(1), Some("2"));
    assert_eq!(tree.at("1").map(TreeValue::as_repeated).map(<[_]>::len), Some(2));
    assert_eq!(tree.at("40000").and_then(TreeValue::as_i64), Some(40_000));
    assert!(elapsed.as_secs() < 5, "decoding took {elapsed:?}");
}

/// A shared, mutable object graph, as an embedding might expose host objects.
#[derive(Clone)]
struct Obj(Rc<RefCell<Vec<(String, Obj)>>>, Option<Rc<str>>);

impl Obj {
    fn map() -> Self {
        Obj(Rc::new(RefCell::new(Vec::new())), None)
    }

    fn text(text: &str) -> Self {
        Obj(Rc::new(RefCell::new(Vec::new())), Some(text.into()))
    }

    fn put(&self, key: &str, child: Obj) {
        self.0.borrow_mut().push((key.to_string(), child));
    }
}

impl Node for Obj {
    fn identity(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    fn kind(&self) -> NodeKind {
        if self.1.is_some() {
            NodeKind::Scalar
        } else {
            NodeKind::Mapping
        }
    }

    fn children(&self) -> Vec<(Segment, Self)> {
        self.0
            .borrow()
            .iter()
            .map(|(key, child)| (Segment::Key(key.clone()), child.clone()))
            .collect()
    }

    fn text(&self) -> Option<String> {
        self.1.as_deref().map(str::to_string)
    }

    fn integer(&self) -> Option<i64> {
        self.1.as_deref().and_then(|text| text.parse().ok())
    }

    fn render(&self) -> Option<String> {
        self.text()
    }
}

#[test]
fn scanner_terminates_on_back_reference() {
    let root = Obj::map();
    let a = Obj::map();
    let b = Obj::map();
    let c = Obj::map();
    root.put("1", a.clone());
    a.put("2", b.clone());
    b.put("3", c.clone());
    c.put("4", root.clone());

    let scanner = PatternScanner::default();
    assert!(!scanner.detect(root.clone()));

    c.put("5", Obj::text("Carol 拍了拍 Dave"));
    let info = scanner.extract(root.clone()).unwrap();
    assert_eq!(info.text.as_deref(), Some("Carol 拍了拍 Dave"));

    // break the cycle so the Rc graph can be freed
    c.0.borrow_mut().retain(|(key, _)| key != "4");
}
