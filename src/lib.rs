// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # wirescope
//!
//! Interception, decoding, pattern detection and packet synthesis for a tagged-field
//! protocol spoken inside a running host application.
//!
//! `wirescope` sits at the host's inbound dispatch point. Every response that passes
//! through is decoded from the compact tagged-field wire format into a generic tree,
//! handed to the handlers registered for its command name and scanned for the "pat"
//! gray-tip event. Handlers can synthesize new messages from JSON templates and push
//! them back into the host's inbound path, where the host treats them as if they had
//! arrived from the network.
//!
//! The host is obfuscated and changes its internal layout between releases, so the
//! interception point itself is located by structural signature rather than by name.
//!
//! ## Features
//!
//! - **Wire codec** - lossless decode/encode of the tagged-field format, bounded nesting
//! - **Tree model** - ordered mappings, repeated fields, JSON bridge with `hex->` bytes
//! - **Pattern scanner** - layered gray-tip detection over any acyclic or cyclic graph
//! - **Binding resolver** - exact-then-relaxed structural probing, cached and persisted
//! - **Synthesis and injection** - `${name}` templates, content slots, loopback delivery
//! - **Sealed envelopes** - magic and key-hash framed AES payloads, zlib card blobs
//!
//! ## Quick Start
//!
//! ```rust
//! use wirescope::prelude::*;
//!
//! let tree = json::parse(r#"{"1": 150, "2": {"3": "hello"}}"#)?;
//! let bytes = wire::encode(&tree)?;
//! assert_eq!(&bytes[..3], &[0x08, 0x96, 0x01]);
//!
//! let decoded = wire::decode(&bytes)?;
//! assert_eq!(decoded.at("2.3").and_then(TreeValue::as_str), Some("hello"));
//! # Ok::<(), wirescope::Error>(())
//! ```
//!
//! ## Wiring a Pipeline
//!
//! ```rust
//! use std::sync::Arc;
//! use wirescope::prelude::*;
//!
//! let pipeline = Pipeline::builder()
//!     .with_config(PipelineConfig::new().with_pattern_detection(true))
//!     .with_store(Arc::new(MemoryStore::new()))
//!     .build();
//!
//! pipeline.dispatcher().register_fn("MessageSvc.PbSendMsg", "audit", |tree, envelope| {
//!     log::info!("{} decoded: {}", envelope.command(), tree.is_some());
//!     Ok(())
//! });
//!
//! let report = pipeline.on_dispatch(&Envelope::push("MessageSvc.PbSendMsg", vec![0x08, 0x01]));
//! assert_eq!(report.invoked, 1);
//! # Ok::<(), wirescope::Error>(())
//! ```
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T>`]. Decode errors never escape the
//! dispatch path; see [`Error`] for the categories and how each is recovered.

#[macro_use]
pub(crate) mod macros;

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// ```rust
/// use wirescope::prelude::*;
///
/// let scanner = PatternScanner::default();
/// let tree = json::parse(r#"{"25": {"1": {"28": {"2": "A 拍了拍 B"}}}}"#)?;
/// assert!(scanner.detect(&tree));
/// # Ok::<(), wirescope::Error>(())
/// ```
pub mod prelude;

/// The tagged-field wire format.
///
/// Decoding turns bytes into a [`tree::TreeValue`]; encoding turns a tree back into
/// canonical bytes. See [`wire::decode`] and [`wire::encode`].
pub mod wire;

/// The decoded tree model, node views for scanning and the JSON bridge.
pub mod tree;

/// Configuration of every pipeline stage.
pub mod config;

/// Durable key/value settings.
pub mod store;

/// Structural discovery of host members.
pub mod binding;

/// Layered detection of the pat gray-tip event.
pub mod scanner;

/// Command-keyed fan-out of decoded responses.
pub mod dispatch;

/// Template-driven message synthesis.
pub mod synth;

/// Delivery of synthesized packets into the host.
pub mod inject;

/// The passphrase-sealed message envelope.
pub mod crypto;

/// `0x01`-prefixed zlib blobs.
pub mod compress;

/// Long message content forms.
pub mod longmsg;

/// The shipped response handlers.
pub mod handlers;

/// The user-interface boundary.
pub mod ui;

/// The interception pipeline.
pub mod pipeline;

/// `wirescope` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `wirescope` Error type
///
/// The main error type for all operations in this crate.
///
/// # Examples
///
/// ```rust
/// use wirescope::{wire, Error};
///
/// match wire::decode(&[0x0B]) {
///     Err(e) if e.is_decode_error() => println!("undecodable: {e}"),
///     Err(e) => println!("other error: {e}"),
///     Ok(tree) => println!("{tree}"),
/// }
/// ```
pub use error::Error;
