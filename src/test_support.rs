//! Record image encoder, fake subjects and stub lookups shared by unit tests.

use core::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_channel::Receiver;

use crate::decode::reader::{PTR, UNICODE_STRING_SIZE, align_up};
use crate::error::ERROR_INVALID_PARAMETER;
use crate::{
    Luid, NameLookup, QueryClass, RawQuery, RawQueryResult, RawRecordBuffer, Sid, Value,
    ValueKind,
};

/// Byte image of a record, laid out as if it lived at `base`.
struct Image {
    bytes: Vec<u8>,
    base: usize,
}

impl Image {
    const fn new(base: usize) -> Self {
        Self {
            bytes: Vec::new(),
            base,
        }
    }

    fn align(&mut self, align: usize) {
        let len = align_up(self.bytes.len(), align);
        self.bytes.resize(len, 0);
    }

    fn reserve(&mut self, len: usize) -> usize {
        self.align(8);
        let offset = self.bytes.len();
        self.bytes.resize(offset + len, 0);
        offset
    }

    fn append(&mut self, bytes: &[u8]) -> usize {
        let offset = self.reserve(bytes.len());
        self.bytes[offset..offset + bytes.len()].copy_from_slice(bytes);
        offset
    }

    fn put(&mut self, at: usize, bytes: &[u8]) {
        self.bytes[at..at + bytes.len()].copy_from_slice(bytes);
    }

    fn put_u16(&mut self, at: usize, value: u16) {
        self.put(at, &value.to_le_bytes());
    }

    fn put_u32(&mut self, at: usize, value: u32) {
        self.put(at, &value.to_le_bytes());
    }

    fn put_u64(&mut self, at: usize, value: u64) {
        self.put(at, &value.to_le_bytes());
    }

    /// Writes a pointer to `target` (an offset in this image).
    fn put_ptr(&mut self, at: usize, target: usize) {
        self.put(at, &(self.base + target).to_le_bytes());
    }

    fn wide(text: &str, terminated: bool) -> Vec<u8> {
        let mut units: Vec<u16> = text.encode_utf16().collect();
        if terminated {
            units.push(0);
        }
        units.iter().flat_map(|unit| unit.to_le_bytes()).collect()
    }

    /// Writes a `UNICODE_STRING` at `at`.
    fn put_unicode_string(&mut self, at: usize, text: &str) {
        let bytes = Self::wide(text, false);
        let len = u16::try_from(bytes.len()).unwrap();
        self.put_u16(at, len);
        self.put_u16(at + 2, len);
        if !bytes.is_empty() {
            let payload = self.append(&bytes);
            self.put_ptr(at + align_up(4, PTR), payload);
        }
    }

    /// Writes a pointer at `at` to a NUL-terminated copy of `text`.
    fn put_terminated_string(&mut self, at: usize, text: &str) {
        let payload = self.append(&Self::wide(text, true));
        self.put_ptr(at, payload);
    }

    /// Writes `{ ptr, u32 len }` at `at` for `bytes`.
    fn put_octets(&mut self, at: usize, bytes: &[u8]) {
        if !bytes.is_empty() {
            let payload = self.append(bytes);
            self.put_ptr(at, payload);
        }
        self.put_u32(at + PTR, u32::try_from(bytes.len()).unwrap());
    }
}

const SID_AND_ATTRIBUTES_SIZE: usize = align_up(PTR + 4, PTR);

/// `TOKEN_GROUPS` image.
pub(crate) fn encode_groups(base: usize, groups: &[(Sid, u32)]) -> Vec<u8> {
    let mut image = Image::new(base);
    let header = align_up(4, PTR);
    image.reserve(header + groups.len() * SID_AND_ATTRIBUTES_SIZE);
    image.put_u32(0, u32::try_from(groups.len()).unwrap());
    for (i, (sid, attributes)) in groups.iter().enumerate() {
        let at = header + i * SID_AND_ATTRIBUTES_SIZE;
        let payload = image.append(&sid.to_bytes());
        image.put_ptr(at, payload);
        image.put_u32(at + PTR, *attributes);
    }
    image.bytes
}

/// `TOKEN_USER` image.
pub(crate) fn encode_user(base: usize, sid: &Sid, attributes: u32) -> Vec<u8> {
    let mut image = Image::new(base);
    image.reserve(SID_AND_ATTRIBUTES_SIZE);
    let payload = image.append(&sid.to_bytes());
    image.put_ptr(0, payload);
    image.put_u32(PTR, attributes);
    image.bytes
}

/// `TOKEN_PRIVILEGES` image (no pointers, so no base).
pub(crate) fn encode_privileges(privileges: &[(Luid, u32)]) -> Vec<u8> {
    let mut bytes = u32::try_from(privileges.len()).unwrap().to_le_bytes().to_vec();
    for (luid, attributes) in privileges {
        bytes.extend_from_slice(&luid.low_part.to_le_bytes());
        bytes.extend_from_slice(&luid.high_part.to_le_bytes());
        bytes.extend_from_slice(&attributes.to_le_bytes());
    }
    bytes
}

/// Which attribute record layout to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flavor {
    Token,
    Claim,
}

impl Flavor {
    const fn name_size(self) -> usize {
        match self {
            Self::Token => UNICODE_STRING_SIZE,
            Self::Claim => PTR,
        }
    }

    const fn record_size(self) -> usize {
        align_up(self.name_size() + 12, PTR) + PTR
    }

    const fn string_size(self) -> usize {
        self.name_size()
    }

    fn put_string(self, image: &mut Image, at: usize, text: &str) {
        match self {
            Self::Token => image.put_unicode_string(at, text),
            Self::Claim => image.put_terminated_string(at, text),
        }
    }
}

/// One attribute as written into an image; fields can disagree with `values`.
#[derive(Debug, Clone)]
pub(crate) struct AttributeImage {
    pub name: String,
    pub raw_kind: u16,
    pub flags: u32,
    pub declared_count: u32,
    pub values: Vec<Value>,
}

impl AttributeImage {
    pub(crate) fn new(name: &str, kind: ValueKind, values: Vec<Value>) -> Self {
        Self {
            name: name.to_owned(),
            raw_kind: kind.into(),
            flags: 0,
            declared_count: u32::try_from(values.len()).unwrap(),
            values,
        }
    }
}

fn value_stride(flavor: Flavor, kind: ValueKind) -> usize {
    match kind {
        ValueKind::String => flavor.string_size(),
        ValueKind::Fqbn => align_up(8 + flavor.string_size(), 8),
        ValueKind::Sid | ValueKind::OctetString => align_up(PTR + 4, PTR),
        ValueKind::Invalid | ValueKind::Int64 | ValueKind::UInt64 | ValueKind::Boolean => 8,
    }
}

/// `TOKEN_SECURITY_ATTRIBUTES_INFORMATION` / `CLAIM_SECURITY_ATTRIBUTES_INFORMATION` image.
///
/// Each attribute's value array is written after its name, and payloads after
/// the array, so the last attribute's values end the image when they have no
/// payloads.
pub(crate) fn encode_attributes(
    base: usize,
    flavor: Flavor,
    version: u16,
    attributes: &[AttributeImage],
) -> Vec<u8> {
    let mut image = Image::new(base);
    let header = align_up(8, PTR) + PTR;
    image.reserve(header);
    image.put_u16(0, version);
    image.put_u32(4, u32::try_from(attributes.len()).unwrap());
    if attributes.is_empty() {
        return image.bytes;
    }
    let records = image.reserve(attributes.len() * flavor.record_size());
    image.put_ptr(align_up(8, PTR), records);
    for (i, attribute) in attributes.iter().enumerate() {
        let at = records + i * flavor.record_size();
        flavor.put_string(&mut image, at, &attribute.name);
        let fields = at + flavor.name_size();
        image.put_u16(fields, attribute.raw_kind);
        image.put_u32(fields + 4, attribute.flags);
        image.put_u32(fields + 8, attribute.declared_count);
        if attribute.values.is_empty() {
            continue;
        }
        let kind = ValueKind::try_from(attribute.raw_kind).unwrap_or(ValueKind::Int64);
        let stride = value_stride(flavor, kind);
        let array = image.reserve(attribute.values.len() * stride);
        image.put_ptr(align_up(fields + 12, PTR), array);
        for (j, value) in attribute.values.iter().enumerate() {
            let slot = array + j * stride;
            match value {
                Value::Int64(number) => image.put(slot, &number.to_le_bytes()),
                Value::UInt64(number) => image.put_u64(slot, *number),
                Value::Boolean(flag) => image.put_u64(slot, u64::from(*flag)),
                Value::Text(text) => flavor.put_string(&mut image, slot, text),
                Value::VersionedName { version, name } => {
                    image.put_u64(slot, *version);
                    flavor.put_string(&mut image, slot + 8, name);
                }
                Value::Principal(sid) => image.put_octets(slot, &sid.to_bytes()),
                Value::OpaqueBytes(bytes) | Value::MalformedPrincipal(bytes) => {
                    image.put_octets(slot, bytes);
                }
            }
        }
    }
    image.bytes
}

/// Buffer holding the image `encode` writes for the buffer's own base address.
pub(crate) fn record_buffer(encode: impl Fn(usize) -> Vec<u8>) -> RawRecordBuffer {
    let len = encode(0).len();
    let mut buffer = RawRecordBuffer::zeroed(len);
    let bytes = encode(buffer.base_address());
    buffer.as_mut_bytes().copy_from_slice(&bytes);
    buffer
}

/// What a [`FakeSubject`] answers for one class.
#[derive(Debug, Clone)]
pub(crate) enum RecordImage {
    User(Sid, u32),
    Groups(Vec<(Sid, u32)>),
    Privileges(Vec<(Luid, u32)>),
    Attributes(Flavor, Vec<AttributeImage>),
    Bytes(Vec<u8>),
    Fail(u32),
}

impl RecordImage {
    fn encode(&self, base: usize) -> Result<Vec<u8>, u32> {
        Ok(match self {
            Self::User(sid, attributes) => encode_user(base, sid, *attributes),
            Self::Groups(groups) => encode_groups(base, groups),
            Self::Privileges(privileges) => encode_privileges(privileges),
            Self::Attributes(flavor, attributes) => encode_attributes(base, *flavor, 1, attributes),
            Self::Bytes(bytes) => bytes.clone(),
            Self::Fail(code) => return Err(*code),
        })
    }
}

/// Subject that answers with encoded images, honouring the size protocol.
#[derive(Debug, Default)]
pub(crate) struct FakeSubject {
    images: HashMap<QueryClass, RecordImage>,
    calls: Cell<u32>,
}

impl FakeSubject {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with(mut self, class: QueryClass, image: RecordImage) -> Self {
        self.images.insert(class, image);
        self
    }

    pub(crate) fn calls(&self) -> u32 {
        self.calls.get()
    }
}

impl RawQuery for FakeSubject {
    fn raw_query(&self, class: QueryClass, buffer: &mut RawRecordBuffer) -> RawQueryResult {
        self.calls.set(self.calls.get() + 1);
        let Some(image) = self.images.get(&class) else {
            return RawQueryResult::Error(ERROR_INVALID_PARAMETER);
        };
        let bytes = match image.encode(buffer.base_address()) {
            Ok(bytes) => bytes,
            Err(code) => return RawQueryResult::Error(code),
        };
        if buffer.len() < bytes.len() {
            return RawQueryResult::BufferTooSmall {
                required: Some(bytes.len()),
            };
        }
        buffer.as_mut_bytes()[..bytes.len()].copy_from_slice(&bytes);
        RawQueryResult::Success {
            written: bytes.len(),
        }
    }
}

/// Subject that replays a fixed list of answers and records offered sizes.
#[derive(Debug, Default)]
pub(crate) struct ScriptedQuery {
    script: RefCell<VecDeque<RawQueryResult>>,
    repeat: Option<RawQueryResult>,
    required: Option<usize>,
    sizes: RefCell<Vec<usize>>,
}

impl ScriptedQuery {
    pub(crate) fn new<I: IntoIterator<Item = RawQueryResult>>(script: I) -> Self {
        Self {
            script: RefCell::new(script.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Answers `result` forever.
    pub(crate) fn repeat(result: RawQueryResult) -> Self {
        Self {
            repeat: Some(result),
            ..Self::default()
        }
    }

    /// A record of exactly `required` bytes.
    pub(crate) fn sized(required: usize) -> Self {
        Self {
            required: Some(required),
            ..Self::default()
        }
    }

    pub(crate) fn sizes(&self) -> Vec<usize> {
        self.sizes.borrow().clone()
    }

    pub(crate) fn calls(&self) -> usize {
        self.sizes.borrow().len()
    }
}

impl RawQuery for ScriptedQuery {
    fn raw_query(&self, _class: QueryClass, buffer: &mut RawRecordBuffer) -> RawQueryResult {
        self.sizes.borrow_mut().push(buffer.len());
        if let Some(required) = self.required {
            return if buffer.len() < required {
                RawQueryResult::BufferTooSmall {
                    required: Some(required),
                }
            } else {
                RawQueryResult::Success { written: required }
            };
        }
        self.script
            .borrow_mut()
            .pop_front()
            .or(self.repeat)
            .unwrap_or(RawQueryResult::Error(ERROR_INVALID_PARAMETER))
    }
}

/// Name lookup backed by fixed tables.
///
/// With a gate, every account lookup first waits for the gate to open (its
/// sender to be dropped), which keeps resolutions in flight while a test acts.
#[derive(Debug, Default)]
pub(crate) struct StubLookup {
    pub accounts: HashMap<Sid, String>,
    pub packages: HashMap<Sid, String>,
    pub app_containers: HashMap<Sid, String>,
    pub capabilities: HashMap<Sid, String>,
    pub gate: Option<Receiver<()>>,
    pub account_calls: AtomicUsize,
}

impl StubLookup {
    pub(crate) fn account_calls(&self) -> usize {
        self.account_calls.load(Ordering::SeqCst)
    }
}

impl NameLookup for StubLookup {
    fn account(&self, sid: &Sid) -> Option<String> {
        if let Some(gate) = &self.gate {
            gate.recv().ok();
        }
        self.account_calls.fetch_add(1, Ordering::SeqCst);
        self.accounts.get(sid).cloned()
    }

    fn package(&self, sid: &Sid) -> Option<String> {
        self.packages.get(sid).cloned()
    }

    fn app_container(&self, sid: &Sid) -> Option<String> {
        self.app_containers.get(sid).cloned()
    }

    fn capability(&self, sid: &Sid) -> Option<String> {
        self.capabilities.get(sid).cloned()
    }
}

/// Parses a SID literal.
pub(crate) fn sid(text: &str) -> Sid {
    text.parse().unwrap()
}
