//! Content forms that reference an uploaded long message.
//!
//! Once a long message is uploaded the service answers with a resource id (`resid`).
//! A sendable message then references it in one of three ways, see [`ContentMode`].
//! Both card forms carry their document as a marked zlib blob (see [`crate::compress`]).

use std::io::Cursor;

use quick_xml::{
    events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
    Writer,
};
use rand::RngCore;
use serde_json::json;
use strum::{Display, EnumIter, EnumString};
use uguid::Guid;

use crate::{
    compress,
    tree::{Mapping, TreeValue},
    Error, Result,
};

/// Service id of the forwarded-history XML card.
pub const XML_SERVICE_ID: i64 = 35;

/// Marker stored next to an XML card blob.
const XML_CARD_TAG: i64 = 60;

/// How the resource is referenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum ContentMode {
    /// A long-message element (field 37)
    LongMsg,
    /// A `com.tencent.multimsg` JSON card (field 51)
    JsonCard,
    /// A service-35 XML card (field 12)
    XmlCard,
}

/// A fresh random (version 4) GUID.
#[must_use]
pub fn random_guid() -> Guid {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    Guid::from_random_bytes(bytes)
}

/// Texts and ids of a forwarded-history reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardCard {
    /// Resource id returned by the upload
    pub resid: String,
    /// Notification and preview text
    pub hint: String,
    /// Body line shown in the card
    pub desc: String,
    /// Footer line
    pub summary: String,
    /// Card title / source label
    pub source: String,
    /// File name id
    pub file_name: Guid,
    /// Unique sequence id of the JSON card
    pub uniseq: Guid,
}

impl ForwardCard {
    /// A card for `resid` with default texts and fresh ids.
    pub fn new(resid: impl Into<String>) -> Self {
        ForwardCard {
            resid: resid.into(),
            hint: "[聊天记录]".to_string(),
            desc: String::new(),
            summary: "查看转发消息".to_string(),
            source: "聊天记录".to_string(),
            file_name: random_guid(),
            uniseq: random_guid(),
        }
    }

    /// Set the preview text.
    #[must_use]
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = hint.into();
        self
    }

    /// Set the body line.
    #[must_use]
    pub fn with_desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = desc.into();
        self
    }

    /// Set the footer line.
    #[must_use]
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    /// Pin the ids instead of random ones.
    #[must_use]
    pub fn with_ids(mut self, file_name: Guid, uniseq: Guid) -> Self {
        self.file_name = file_name;
        self.uniseq = uniseq;
        self
    }

    /// Build the content element for `mode`.
    ///
    /// # Errors
    /// Returns an error if a card document could not be serialized or compressed.
    pub fn build(&self, mode: ContentMode) -> Result<TreeValue> {
        match mode {
            ContentMode::LongMsg => Ok(self.long_msg_element()),
            ContentMode::JsonCard => self.json_card(),
            ContentMode::XmlCard => self.xml_card(),
        }
    }

    /// `{"37": {"6": 1, "7": resid, "17": 0, "19": {"15": 0, "31": 0, "41": 0}}}`
    #[must_use]
    pub fn long_msg_element(&self) -> TreeValue {
        let flags: Mapping = ["15", "31", "41"]
            .into_iter()
            .map(|key| (key.to_string(), TreeValue::from(0i64)))
            .collect();

        let mut element = Mapping::new();
        element.insert("6", TreeValue::from(1i64));
        element.insert("7", TreeValue::from(self.resid.as_str()));
        element.insert("17", TreeValue::from(0i64));
        element.insert("19", TreeValue::Mapping(flags));

        let mut root = Mapping::new();
        root.insert("37", TreeValue::Mapping(element));
        TreeValue::Mapping(root)
    }

    /// The JSON card document.
    #[must_use]
    pub fn json_document(&self) -> String {
        json!({
            "app": "com.tencent.multimsg",
            "config": {"autosize": 1, "forward": 1, "round": 1, "type": "normal", "width": 300},
            "desc": self.hint,
            "extra": format!("{{\"filename\":\"{}\",\"tsum\":1}}\n", self.file_name),
            "meta": {
                "detail": {
                    "news": [{"text": self.desc}],
                    "resid": self.resid,
                    "source": self.source,
                    "summary": self.summary,
                    "uniseq": self.uniseq.to_string(),
                }
            },
            "prompt": self.hint,
            "ver": "0.0.0.5",
            "view": "contact",
        })
        .to_string()
    }

    /// `{"51": {"1": <marked zlib of the JSON document>}}`
    ///
    /// # Errors
    /// Returns an error if compression fails.
    pub fn json_card(&self) -> Result<TreeValue> {
        let blob = compress::compress(self.json_document().as_bytes())?;

        let mut card = Mapping::new();
        card.insert("1", TreeValue::from(blob));
        let mut root = Mapping::new();
        root.insert("51", TreeValue::Mapping(card));
        Ok(TreeValue::Mapping(root))
    }

    /// The XML card document.
    ///
    /// # Errors
    /// Returns [`Error::Error`] if the XML writer fails.
    pub fn xml_document(&self) -> Result<String> {
        let file_name = self.file_name.to_string();
        let service_id = XML_SERVICE_ID.to_string();
        let mut writer = Writer::new(Cursor::new(Vec::new()));

        let events = [
            Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)),
            Event::Start(BytesStart::new("msg").with_attributes([
                ("brief", self.desc.as_str()),
                ("m_fileName", file_name.as_str()),
                ("action", "viewMultiMsg"),
                ("tSum", "1"),
                ("flag", "3"),
                ("m_resid", self.resid.as_str()),
                ("serviceID", service_id.as_str()),
                ("m_fileSize", "0"),
            ])),
            Event::Start(BytesStart::new("item").with_attributes([("layout", "1")])),
            Event::Start(
                BytesStart::new("title").with_attributes([("color", "#000000"), ("size", "34")]),
            ),
            Event::Text(BytesText::new(&self.source)),
            Event::End(BytesEnd::new("title")),
            Event::Start(
                BytesStart::new("title").with_attributes([("color", "#777777"), ("size", "26")]),
            ),
            Event::Text(BytesText::new(&self.desc)),
            Event::End(BytesEnd::new("title")),
            Event::Start(BytesStart::new("hr")),
            Event::End(BytesEnd::new("hr")),
            Event::Start(
                BytesStart::new("summary").with_attributes([("color", "#808080"), ("size", "26")]),
            ),
            Event::Text(BytesText::new(&self.summary)),
            Event::End(BytesEnd::new("summary")),
            Event::End(BytesEnd::new("item")),
            Event::Start(BytesStart::new("source").with_attributes([("name", self.source.as_str())])),
            Event::End(BytesEnd::new("source")),
            Event::End(BytesEnd::new("msg")),
        ];

        for event in events {
            writer
                .write_event(event)
                .map_err(|e| Error::Error(format!("xml card: {e}")))?;
        }

        String::from_utf8(writer.into_inner().into_inner())
            .map_err(|e| Error::Error(format!("xml card: {e}")))
    }

    /// `{"12": {"1": <marked zlib of the XML document>, "2": 60}}`
    ///
    /// # Errors
    /// Returns an error if the document could not be written or compressed.
    pub fn xml_card(&self) -> Result<TreeValue> {
        let blob = compress::compress(self.xml_document()?.as_bytes())?;

        let mut card = Mapping::new();
        card.insert("1", TreeValue::from(blob));
        card.insert("2", TreeValue::from(XML_CARD_TAG));
        let mut root = Mapping::new();
        root.insert("12", TreeValue::Mapping(card));
        Ok(TreeValue::Mapping(root))
    }
}
