/*
 * params.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Ragnatela, a socket-level HTTP(S) client engine.
 *
 * Ragnatela is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Ragnatela is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Ragnatela.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Request parameters: text fields, flags, repeated fields and file
//! attachments, serialized as a query string, an urlencoded form body or
//! multipart/form-data.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::{Result, WebError};
use crate::transport::Transport;
use crate::util;

const FILE_CHUNK: usize = 2048;

/// Streaming byte supplier for attachment contents. The total size must be
/// known up front so Content-Length can be computed before any data is
/// written. `stream` may be called more than once per source; each call
/// replays the contents from the start.
pub trait ContentSource {
    fn size(&self) -> u64;
    fn stream(&mut self, sink: &mut dyn FnMut(&[u8]) -> Result<()>) -> Result<()>;
    fn clone_box(&self) -> Box<dyn ContentSource>;
}

impl Clone for Box<dyn ContentSource> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// File-backed content source. The size is taken at construction time; the
/// file is reopened and read in chunks on every serialization pass.
#[derive(Clone)]
pub struct FileSource {
    path: PathBuf,
    size: u64,
}

impl FileSource {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let size = std::fs::metadata(&path)
            .map_err(|e| WebError::FileAccess(format!("{}: {}", path.display(), e)))?
            .len();
        Ok(Self { path, size })
    }
}

impl ContentSource for FileSource {
    fn size(&self) -> u64 {
        self.size
    }

    fn stream(&mut self, sink: &mut dyn FnMut(&[u8]) -> Result<()>) -> Result<()> {
        let mut file = File::open(&self.path)
            .map_err(|e| WebError::FileAccess(format!("{}: {}", self.path.display(), e)))?;
        let mut buf = [0u8; FILE_CHUNK];
        loop {
            let n = file
                .read(&mut buf)
                .map_err(|e| WebError::FileAccess(format!("{}: {}", self.path.display(), e)))?;
            if n == 0 {
                return Ok(());
            }
            sink(&buf[..n])?;
        }
    }

    fn clone_box(&self) -> Box<dyn ContentSource> {
        Box::new(self.clone())
    }
}

enum AttachmentData {
    Bytes(Vec<u8>),
    Source(Box<dyn ContentSource>),
}

impl Clone for AttachmentData {
    fn clone(&self) -> Self {
        match self {
            AttachmentData::Bytes(b) => AttachmentData::Bytes(b.clone()),
            AttachmentData::Source(s) => AttachmentData::Source(s.clone()),
        }
    }
}

/// One uploaded file: a filename for the Content-Disposition line, an
/// optional Content-Type and the contents, either in memory or streamed
/// from a [`ContentSource`].
#[derive(Clone)]
pub struct Attachment {
    filename: String,
    content_type: Option<String>,
    data: AttachmentData,
}

impl Attachment {
    pub fn from_bytes(filename: impl Into<String>, contents: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content_type: None,
            data: AttachmentData::Bytes(contents),
        }
    }

    pub fn from_source(filename: impl Into<String>, source: Box<dyn ContentSource>) -> Self {
        Self {
            filename: filename.into(),
            content_type: None,
            data: AttachmentData::Source(source),
        }
    }

    /// Attachment streamed from a file on disk.
    pub fn from_file(filename: impl Into<String>, path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::from_source(filename, Box::new(FileSource::new(path)?)))
    }

    pub fn set_content_type(&mut self, content_type: impl Into<String>) {
        self.content_type = Some(content_type.into());
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn size(&self) -> u64 {
        match &self.data {
            AttachmentData::Bytes(b) => b.len() as u64,
            AttachmentData::Source(s) => s.size(),
        }
    }

    fn write_contents(&mut self, socket: &mut dyn Transport) -> Result<()> {
        match &mut self.data {
            AttachmentData::Bytes(b) => {
                socket.write_all(b)?;
            }
            AttachmentData::Source(s) => {
                s.stream(&mut |chunk| {
                    socket.write_all(chunk)?;
                    Ok(())
                })?;
            }
        }
        Ok(())
    }
}

/// One value slot inside a parameter.
#[derive(Clone)]
pub enum ParamItem {
    Text(String),
    Attachment(Attachment),
}

impl From<&str> for ParamItem {
    fn from(s: &str) -> Self {
        ParamItem::Text(s.to_string())
    }
}

impl From<String> for ParamItem {
    fn from(s: String) -> Self {
        ParamItem::Text(s)
    }
}

impl From<Attachment> for ParamItem {
    fn from(a: Attachment) -> Self {
        ParamItem::Attachment(a)
    }
}

/// A parameter value: a single item, a bare flag (name without `=`) or a
/// repeated field serialized with a `[]` name suffix.
#[derive(Clone)]
pub enum ParamValue {
    Single(ParamItem),
    Flag,
    List(Vec<ParamItem>),
}

impl ParamValue {
    pub fn text(s: impl Into<String>) -> Self {
        ParamValue::Single(ParamItem::Text(s.into()))
    }

    pub fn attachment(a: Attachment) -> Self {
        ParamValue::Single(ParamItem::Attachment(a))
    }

    fn has_attachments(&self) -> bool {
        match self {
            ParamValue::Single(ParamItem::Attachment(_)) => true,
            ParamValue::List(items) => items
                .iter()
                .any(|i| matches!(i, ParamItem::Attachment(_))),
            _ => false,
        }
    }
}

/// Which parameters a serialization pass covers.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    All,
    /// Query-string-only parameters, never part of a request body.
    GetOnly,
    /// Body parameters (everything that is not GET-only).
    BodyOnly,
}

/// Ordered parameter collection for one request. Setting a name twice
/// replaces the earlier value in place. GET-only parameters always travel
/// in the query string and reject attachments.
#[derive(Clone, Default)]
pub struct ParamManager {
    params: Vec<(String, ParamValue)>,
    get_only: Vec<(String, ParamValue)>,
    url_encode: bool,
}

impl ParamManager {
    pub fn new(url_encode: bool) -> Self {
        Self {
            url_encode,
            ..Default::default()
        }
    }

    pub fn set_auto_url_encode(&mut self, enabled: bool) {
        self.url_encode = enabled;
    }

    pub fn auto_url_encode(&self) -> bool {
        self.url_encode
    }

    pub fn set_param(
        &mut self,
        name: impl Into<String>,
        value: ParamValue,
        get_only: bool,
    ) -> Result<()> {
        if get_only && value.has_attachments() {
            return Err(WebError::Unsupported(
                "file attachment can not be a GET-only parameter".into(),
            ));
        }
        let name = name.into();
        let list = if get_only {
            &mut self.get_only
        } else {
            &mut self.params
        };
        match list.iter_mut().find(|(n, _)| *n == name) {
            Some((_, v)) => *v = value,
            None => list.push((name, value)),
        }
        Ok(())
    }

    /// Convenience for the common text case.
    pub fn set_text(&mut self, name: impl Into<String>, value: impl Into<String>) {
        // text values never carry attachments, set_param can not fail
        let _ = self.set_param(name, ParamValue::text(value), false);
    }

    pub fn get_param(&self, name: &str) -> Option<&ParamValue> {
        self.params
            .iter()
            .chain(self.get_only.iter())
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn has_param(&self, name: &str) -> bool {
        self.get_param(name).is_some()
    }

    pub fn remove_param(&mut self, name: &str) {
        self.params.retain(|(n, _)| n != name);
        self.get_only.retain(|(n, _)| n != name);
    }

    pub fn clear(&mut self) {
        self.params.clear();
        self.get_only.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty() && self.get_only.is_empty()
    }

    /// Body parameters in insertion order, for copying across requests.
    pub fn body_params(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.params.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn has_attachments(&self) -> bool {
        self.params.iter().any(|(_, v)| v.has_attachments())
    }

    fn selected(&self, kind: ParamKind) -> Vec<&(String, ParamValue)> {
        match kind {
            ParamKind::All => self.params.iter().chain(self.get_only.iter()).collect(),
            ParamKind::GetOnly => self.get_only.iter().collect(),
            ParamKind::BodyOnly => self.params.iter().collect(),
        }
    }

    fn encode(&self, s: &str) -> String {
        if self.url_encode {
            util::url_encode(s)
        } else {
            s.to_string()
        }
    }

    /// Serializes the selected non-attachment parameters. With a boundary
    /// this produces the text parts of a multipart/form-data body (plus the
    /// closing delimiter when no attachments follow); without one, an
    /// `application/x-www-form-urlencoded` string.
    pub fn raw_param_string(&self, kind: ParamKind, boundary: Option<&str>) -> String {
        match boundary {
            Some(b) => self.multipart_text_parts(kind, b),
            None => self.urlencoded_string(kind),
        }
    }

    fn urlencoded_string(&self, kind: ParamKind) -> String {
        let mut pairs = Vec::new();
        for (name, value) in self.selected(kind) {
            match value {
                ParamValue::Flag => pairs.push(self.encode(name)),
                ParamValue::Single(ParamItem::Text(v)) => {
                    pairs.push(format!("{}={}", self.encode(name), self.encode(v)));
                }
                ParamValue::List(items) => {
                    for item in items {
                        if let ParamItem::Text(v) = item {
                            pairs.push(format!("{}[]={}", self.encode(name), self.encode(v)));
                        }
                    }
                }
                ParamValue::Single(ParamItem::Attachment(_)) => {}
            }
        }
        pairs.join("&")
    }

    fn multipart_text_parts(&self, kind: ParamKind, boundary: &str) -> String {
        let mut out = String::new();
        for (name, value) in self.selected(kind) {
            match value {
                ParamValue::Flag => out.push_str(&text_part(boundary, &self.encode(name), "", false)),
                ParamValue::Single(ParamItem::Text(v)) => {
                    out.push_str(&text_part(boundary, &self.encode(name), v, false));
                }
                ParamValue::List(items) => {
                    for item in items {
                        if let ParamItem::Text(v) = item {
                            out.push_str(&text_part(boundary, &self.encode(name), v, true));
                        }
                    }
                }
                ParamValue::Single(ParamItem::Attachment(_)) => {}
            }
        }
        if !self.has_attachments() {
            out.push_str(&terminator(boundary));
        }
        out
    }

    /// Byte length of the attachment parts (framing plus contents plus the
    /// closing delimiter), needed for Content-Length before streaming.
    pub fn raw_file_data_len(&self, boundary: &str) -> u64 {
        let mut total = 0u64;
        let mut any = false;
        for (name, value) in &self.params {
            for (a, multiple) in attachments_of(value) {
                any = true;
                let prefix = attachment_prefix(boundary, name, multiple, a, self.url_encode);
                total += prefix.len() as u64 + a.size() + 2;
            }
        }
        if any {
            total += terminator(boundary).len() as u64;
        }
        total
    }

    /// Streams the attachment parts and the closing delimiter.
    pub fn write_file_data(&mut self, socket: &mut dyn Transport, boundary: &str) -> Result<()> {
        let mut any = false;
        let encode = self.url_encode;
        for (name, value) in &mut self.params {
            let items: Vec<(&mut Attachment, bool)> = match value {
                ParamValue::Single(ParamItem::Attachment(a)) => vec![(a, false)],
                ParamValue::List(items) => items
                    .iter_mut()
                    .filter_map(|i| match i {
                        ParamItem::Attachment(a) => Some((a, true)),
                        _ => None,
                    })
                    .collect(),
                _ => Vec::new(),
            };
            for (a, multiple) in items {
                any = true;
                let prefix = attachment_prefix(boundary, name, multiple, a, encode);
                socket.write_all(prefix.as_bytes())?;
                a.write_contents(socket)?;
                socket.write_all(b"\r\n")?;
            }
        }
        if any {
            socket.write_all(terminator(boundary).as_bytes())?;
        }
        Ok(())
    }
}

fn attachment_prefix(
    boundary: &str,
    name: &str,
    multiple: bool,
    a: &Attachment,
    encode: bool,
) -> String {
    let enc = |s: &str| {
        if encode {
            util::url_encode(s)
        } else {
            s.to_string()
        }
    };
    let suffix = if multiple { "[]" } else { "" };
    let mut s = format!(
        "--{}\r\nContent-Disposition: form-data; name=\"{}{}\"; filename=\"{}\"",
        boundary,
        enc(name),
        suffix,
        enc(a.filename()),
    );
    if let Some(ct) = a.content_type() {
        s.push_str("\r\nContent-Type: ");
        s.push_str(ct);
    }
    s.push_str("\r\n\r\n");
    s
}

fn attachments_of(value: &ParamValue) -> Vec<(&Attachment, bool)> {
    match value {
        ParamValue::Single(ParamItem::Attachment(a)) => vec![(a, false)],
        ParamValue::List(items) => items
            .iter()
            .filter_map(|i| match i {
                ParamItem::Attachment(a) => Some((a, true)),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn text_part(boundary: &str, name: &str, value: &str, multiple: bool) -> String {
    let suffix = if multiple { "[]" } else { "" };
    format!(
        "--{}\r\nContent-Disposition: form-data; name=\"{}{}\"\r\n\r\n{}\r\n",
        boundary, name, suffix, value,
    )
}

fn terminator(boundary: &str) -> String {
    format!("--{}--\r\n", boundary)
}
