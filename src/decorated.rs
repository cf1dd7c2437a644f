// Delta compression for decorated binaries.
//
// The delta of a decorated value is an envelope around a value delta:
//
//   DECO_NO_CHANGES  <value delta>
//   DECO_DELETE_ALL  <value section>
//   <op>* DECO_TERM  <value section>
//   <value delta>                        (first byte not a DECO_* byte)
//
// with decoration operations
//
//   DECO_INSERT <id> <length> <bytes>
//   DECO_UPDATE <id> <length> <binary delta of the decoration>
//   DECO_DELETE <id>
//
// and a value section that is empty or VALUE_NO_CHANGES (no value change),
// VALUE_CHANGES followed by the value delta, or the value delta itself.
// Ids and lengths are packed integers.

use std::borrow::Cow;

use crate::binary::{self, BinaryDeltaCompressor};
use crate::compressor::{DeltaCompressor, DeltaError};
use crate::decoration::{BinaryDecorations, DECO_ID_MAX, DECO_VALUE, DecorationStore};
use crate::packed;

pub const DECO_NO_CHANGES: u8 = 0xEF;
pub const DECO_DELETE_ALL: u8 = 0xEE;
pub const DECO_INSERT: u8 = 0xED;
pub const DECO_UPDATE: u8 = 0xEC;
pub const DECO_DELETE: u8 = 0xEB;
pub const DECO_TERM: u8 = 0xEA;

pub const VALUE_CHANGES: u8 = 0xE1;
pub const VALUE_NO_CHANGES: u8 = 0xE0;

/// Whether a value delta starting with `b` would be misread as the start of
/// a decoration envelope.
#[inline]
fn is_deco_byte(b: u8) -> bool {
    matches!(
        b,
        DECO_NO_CHANGES | DECO_DELETE_ALL | DECO_INSERT | DECO_UPDATE | DECO_DELETE | DECO_TERM
    )
}

#[inline]
fn is_value_byte(b: u8) -> bool {
    matches!(b, VALUE_CHANGES | VALUE_NO_CHANGES)
}

/// Shared default instance.
pub const DEFAULT: DecoratedBinaryDeltaCompressor = DecoratedBinaryDeltaCompressor::new();

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// One decoration operation of an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecorationOp<'a> {
    Insert { id: usize, value: &'a [u8] },
    Update { id: usize, delta: &'a [u8] },
    Delete { id: usize },
}

impl DecorationOp<'_> {
    pub fn id(&self) -> usize {
        match *self {
            DecorationOp::Insert { id, .. }
            | DecorationOp::Update { id, .. }
            | DecorationOp::Delete { id } => id,
        }
    }
}

/// A parsed decorated delta.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Envelope<'a> {
    /// All decorations other than the value are dropped.
    pub delete_all: bool,
    pub ops: Vec<DecorationOp<'a>>,
    /// Delta for the value (decoration 0), `None` if it is unchanged.
    pub value_delta: Option<&'a [u8]>,
}

impl<'a> Envelope<'a> {
    pub fn parse(delta: &'a [u8]) -> Result<Self, DeltaError> {
        let mut env = Envelope::default();

        let pos = match delta.first().copied() {
            Some(DECO_NO_CHANGES) => {
                env.value_delta = Some(&delta[1..]);
                return Ok(env);
            }
            Some(DECO_DELETE_ALL) => {
                env.delete_all = true;
                1
            }
            Some(b) if is_deco_byte(b) => env.parse_ops(delta)?,
            _ => {
                env.value_delta = Some(delta);
                return Ok(env);
            }
        };

        env.value_delta = match delta.get(pos).copied() {
            None | Some(VALUE_NO_CHANGES) => None,
            Some(VALUE_CHANGES) => Some(&delta[pos + 1..]),
            Some(_) => Some(&delta[pos..]),
        };
        Ok(env)
    }

    /// Read operations up to and including `DECO_TERM`, returning the offset
    /// of the value section.
    fn parse_ops(&mut self, delta: &'a [u8]) -> Result<usize, DeltaError> {
        let mut pos = 0;
        loop {
            let Some(&op) = delta.get(pos) else {
                return Err(DeltaError::MissingTerminator { offset: pos });
            };
            let op_offset = pos;
            pos += 1;

            let op = match op {
                DECO_TERM => return Ok(pos),
                DECO_INSERT => {
                    let id = read_id(delta, &mut pos)?;
                    let value = read_bytes(delta, &mut pos)?;
                    DecorationOp::Insert { id, value }
                }
                DECO_UPDATE => {
                    let id = read_id(delta, &mut pos)?;
                    let delta = read_bytes(delta, &mut pos)?;
                    DecorationOp::Update { id, delta }
                }
                DECO_DELETE => DecorationOp::Delete {
                    id: read_id(delta, &mut pos)?,
                },
                _ => {
                    return Err(DeltaError::UnknownDecorationOp {
                        op,
                        offset: op_offset,
                    });
                }
            };
            log::trace!("envelope: {op:?}");
            self.ops.push(op);
        }
    }
}

fn read_id(data: &[u8], pos: &mut usize) -> Result<usize, DeltaError> {
    let (id, consumed) = packed::read_i64(&data[*pos..]).map_err(DeltaError::packed(*pos))?;
    *pos += consumed;
    usize::try_from(id)
        .ok()
        .filter(|&id| id <= DECO_ID_MAX)
        .ok_or(DeltaError::DecorationIndex { id })
}

fn read_bytes<'a>(data: &'a [u8], pos: &mut usize) -> Result<&'a [u8], DeltaError> {
    let (len, consumed) = packed::read_len(&data[*pos..]).map_err(DeltaError::packed(*pos))?;
    let start = *pos + consumed;
    let end = start
        .checked_add(len)
        .filter(|&end| end <= data.len())
        .ok_or(DeltaError::LiteralOverrun {
            offset: start,
            len,
            delta_len: data.len(),
        })?;
    *pos = end;
    Ok(&data[start..end])
}

fn push_bytes(out: &mut Vec<u8>, data: &[u8]) {
    packed::push_len(out, data.len());
    out.extend_from_slice(data);
}

// ---------------------------------------------------------------------------
// DecoratedBinaryDeltaCompressor
// ---------------------------------------------------------------------------

/// Delta compressor aware of decorated binaries.
///
/// Decorations are diffed one by one; the value is diffed by the inner
/// compressor `C`. Decoration updates always use the default
/// [`BinaryDeltaCompressor`] regardless of `C`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoratedBinaryDeltaCompressor<C = BinaryDeltaCompressor, D = BinaryDecorations> {
    inner: C,
    store: D,
}

impl DecoratedBinaryDeltaCompressor {
    pub const fn new() -> Self {
        Self {
            inner: BinaryDeltaCompressor::new(),
            store: BinaryDecorations,
        }
    }
}

impl<C> DecoratedBinaryDeltaCompressor<C> {
    /// Wrap `inner` for value deltas, using the standard decoration format.
    pub const fn with_inner(inner: C) -> Self {
        Self {
            inner,
            store: BinaryDecorations,
        }
    }
}

impl<C, D> DecoratedBinaryDeltaCompressor<C, D> {
    pub const fn with_parts(inner: C, store: D) -> Self {
        Self { inner, store }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn store(&self) -> &D {
        &self.store
    }
}

impl<C: DeltaCompressor, D: DecorationStore> DecoratedBinaryDeltaCompressor<C, D> {
    /// Emit decoration operations for `old` -> `new`, `new` being decorated.
    /// Returns the value parts to diff, or `None` when the value operation
    /// was already emitted as an INSERT or DELETE of id 0.
    fn diff_decorations<'a>(
        &self,
        old: &'a [u8],
        new: &'a [u8],
        out: &mut Vec<u8>,
    ) -> Result<Option<(Option<&'a [u8]>, &'a [u8])>, DeltaError> {
        let old_decos = self.store.decorations(old)?;
        let new_decos = self.store.decorations(new)?;
        let get = |decos: &[Option<&'a [u8]>], id: usize| decos.get(id).copied().flatten();

        let old_value = get(&old_decos, DECO_VALUE);
        let new_value = get(&new_decos, DECO_VALUE);
        let values = match (old_value, new_value) {
            (Some(_), None) => {
                out.push(DECO_DELETE);
                packed::push_len(out, DECO_VALUE);
                None
            }
            (None, Some(value)) => {
                out.push(DECO_INSERT);
                packed::push_len(out, DECO_VALUE);
                push_bytes(out, value);
                None
            }
            (old_value, Some(new_value)) => Some((old_value, new_value)),
            (None, None) => None,
        };

        for id in 1..old_decos.len().max(new_decos.len()) {
            match (get(&old_decos, id), get(&new_decos, id)) {
                (None, Some(deco)) => {
                    out.push(DECO_INSERT);
                    packed::push_len(out, id);
                    push_bytes(out, deco);
                }
                (Some(_), None) => {
                    out.push(DECO_DELETE);
                    packed::push_len(out, id);
                }
                (Some(old_deco), Some(new_deco)) => {
                    if let Some(delta) = binary::DEFAULT.extract(Some(old_deco), new_deco) {
                        out.push(DECO_UPDATE);
                        packed::push_len(out, id);
                        push_bytes(out, &delta);
                    }
                }
                (None, None) => {}
            }
        }

        if !out.is_empty() {
            out.push(DECO_TERM);
        }
        Ok(values)
    }
}

impl<C: DeltaCompressor, D: DecorationStore> DeltaCompressor for DecoratedBinaryDeltaCompressor<C, D> {
    fn extract_delta(
        &self,
        old: Option<&[u8]>,
        new: &[u8],
    ) -> Result<Option<Vec<u8>>, DeltaError> {
        let old = old.unwrap_or_default();
        if old == new {
            return Ok(None);
        }

        let mut deco = Vec::new();
        let value_delta = if self.store.is_decorated(new) {
            match self.diff_decorations(old, new, &mut deco)? {
                Some((old_value, new_value)) => self.inner.extract_delta(old_value, new_value)?,
                None => None,
            }
        } else if self.store.is_decorated(old) {
            deco.push(DECO_DELETE_ALL);
            self.inner.extract_delta(self.store.undecorated(old)?, new)?
        } else {
            self.inner.extract_delta(Some(old), new)?
        };

        log::debug!(
            "decorated delta: deco={} value={:?}",
            deco.len(),
            value_delta.as_ref().map(Vec::len)
        );

        Ok(match (deco.is_empty(), value_delta) {
            (true, None) => None,
            (true, Some(vd)) => {
                if vd.first().copied().is_some_and(is_deco_byte) {
                    let mut out = Vec::with_capacity(vd.len() + 1);
                    out.push(DECO_NO_CHANGES);
                    out.extend_from_slice(&vd);
                    Some(out)
                } else {
                    Some(vd)
                }
            }
            (false, None) => {
                deco.push(VALUE_NO_CHANGES);
                Some(deco)
            }
            (false, Some(vd)) => {
                if vd.first().copied().is_none_or(is_value_byte) {
                    deco.push(VALUE_CHANGES);
                }
                deco.extend_from_slice(&vd);
                Some(deco)
            }
        })
    }

    fn apply_delta(&self, old: Option<&[u8]>, delta: Option<&[u8]>) -> Result<Vec<u8>, DeltaError> {
        let old = old.unwrap_or_default();
        let Some(delta) = delta else {
            return Ok(old.to_vec());
        };

        let env = Envelope::parse(delta)?;
        log::debug!(
            "apply decorated: delete_all={} ops={} value_delta={:?}",
            env.delete_all,
            env.ops.len(),
            env.value_delta.map(<[u8]>::len)
        );

        let mut decos: Vec<Option<Cow<'_, [u8]>>> = self
            .store
            .decorations(old)?
            .into_iter()
            .map(|d| d.map(Cow::Borrowed))
            .collect();
        if decos.is_empty() {
            decos.push(None);
        }
        if env.delete_all {
            decos.truncate(1);
        }

        for op in &env.ops {
            let id = op.id();
            match *op {
                DecorationOp::Insert { value, .. } => {
                    if decos.len() <= id {
                        decos.resize(id + 1, None);
                    }
                    decos[id] = Some(Cow::Borrowed(value));
                }
                DecorationOp::Update { delta, .. } => {
                    let slot = present_slot(&mut decos, id)?;
                    let updated = binary::DEFAULT.apply(slot.as_deref(), Some(delta))?;
                    *slot = Some(Cow::Owned(updated));
                }
                DecorationOp::Delete { .. } => {
                    *present_slot(&mut decos, id)? = None;
                }
            }
        }

        if let Some(vd) = env.value_delta {
            let value = self.inner.apply_delta(decos[DECO_VALUE].as_deref(), Some(vd))?;
            decos[DECO_VALUE] = Some(Cow::Owned(value));
        }

        let refs: Vec<Option<&[u8]>> = decos.iter().map(Option::as_deref).collect();
        Ok(self.store.decorate(&refs)?.unwrap_or_default())
    }
}

/// The slot of decoration `id`, which must be present.
fn present_slot<'v, 'a>(
    decos: &'v mut [Option<Cow<'a, [u8]>>],
    id: usize,
) -> Result<&'v mut Option<Cow<'a, [u8]>>, DeltaError> {
    match decos.get_mut(id) {
        Some(slot) if slot.is_some() => Ok(slot),
        _ => Err(DeltaError::DecorationIndex { id: id as i64 }),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
