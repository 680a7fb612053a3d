//! Binary encoding of stores.
//!
//! Layout (all integers and floats little-endian):
//!
//! ```text
//! magic "RRDP" | version u16
//! step u64 | consolidation u8
//! ds name (u16 length + UTF-8) | heartbeat u64 | min f64 | max f64
//! archive count u16 | per archive: steps u32, rows u32, xff f64
//! last_update u64 | last_value f64 | pdp_value f64 | pdp_unknown u64
//! per archive: cur_row u32, acc f64, known u64, unknown u64, rows × f64
//! SHA-256 of everything above (32 bytes)
//! ```

use crate::consolidation::ConsolidationFunction;
use crate::error::FormatError;
use crate::schema::{ArchiveDef, DataSourceDef, StoreSchema};
use crate::store::{ArchiveState, DataSourceState, RoundRobinStore};
use sha2::{Digest, Sha256};

pub const MAGIC: &[u8; 4] = b"RRDP";
pub const FORMAT_VERSION: u16 = 1;
const DIGEST_LEN: usize = 32;

/// Serialize a store to bytes.
pub fn encode(store: &RoundRobinStore) -> Vec<u8> {
    let schema = store.schema();
    let ds = store.data_source();
    let rows: usize = schema.archives.iter().map(|a| a.rows as usize).sum();
    let mut out = Vec::with_capacity(128 + rows * 8 + schema.archives.len() * 48);

    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());

    out.extend_from_slice(&schema.step.to_le_bytes());
    out.push(schema.consolidation.tag());
    let name = schema.data_source.name.as_bytes();
    out.extend_from_slice(&(name.len().min(u16::MAX as usize) as u16).to_le_bytes());
    out.extend_from_slice(&name[..name.len().min(u16::MAX as usize)]);
    out.extend_from_slice(&schema.data_source.heartbeat.to_le_bytes());
    out.extend_from_slice(&schema.data_source.min.to_le_bytes());
    out.extend_from_slice(&schema.data_source.max.to_le_bytes());
    out.extend_from_slice(&(schema.archives.len() as u16).to_le_bytes());
    for arc in &schema.archives {
        out.extend_from_slice(&arc.steps.to_le_bytes());
        out.extend_from_slice(&arc.rows.to_le_bytes());
        out.extend_from_slice(&arc.xff.to_le_bytes());
    }

    out.extend_from_slice(&ds.last_update.to_le_bytes());
    out.extend_from_slice(&ds.last_value.to_le_bytes());
    out.extend_from_slice(&ds.pdp_value.to_le_bytes());
    out.extend_from_slice(&ds.pdp_unknown.to_le_bytes());

    for arc in store.archive_states() {
        out.extend_from_slice(&arc.cur_row.to_le_bytes());
        out.extend_from_slice(&arc.acc.to_le_bytes());
        out.extend_from_slice(&arc.known.to_le_bytes());
        out.extend_from_slice(&arc.unknown.to_le_bytes());
        for v in &arc.values {
            out.extend_from_slice(&v.to_le_bytes());
        }
    }

    let digest = Sha256::digest(&out);
    out.extend_from_slice(&digest);
    out
}

/// Parse bytes produced by [`encode`].
pub fn decode(bytes: &[u8]) -> Result<RoundRobinStore, FormatError> {
    if bytes.len() < MAGIC.len() || &bytes[..MAGIC.len()] != MAGIC {
        return Err(FormatError::BadMagic);
    }
    if bytes.len() < MAGIC.len() + 2 + DIGEST_LEN {
        return Err(FormatError::Truncated(bytes.len()));
    }
    let (body, digest) = bytes.split_at(bytes.len() - DIGEST_LEN);
    if Sha256::digest(body).as_slice() != digest {
        return Err(FormatError::DigestMismatch);
    }

    let mut r = Reader::new(body);
    r.skip(MAGIC.len())?;
    let version = r.u16()?;
    if version != FORMAT_VERSION {
        return Err(FormatError::UnsupportedVersion(version));
    }

    let step = r.u64()?;
    let tag = r.u8()?;
    let consolidation = ConsolidationFunction::from_tag(tag)
        .ok_or_else(|| FormatError::InvalidSchema(format!("unknown consolidation tag {tag}")))?;
    let name_len = r.u16()? as usize;
    let name = std::str::from_utf8(r.take(name_len)?)
        .map_err(|_| FormatError::InvalidSchema("data source name is not UTF-8".into()))?
        .to_string();
    let data_source = DataSourceDef {
        name,
        heartbeat: r.u64()?,
        min: r.f64()?,
        max: r.f64()?,
    };
    let archive_count = r.u16()? as usize;
    let mut archives = Vec::with_capacity(archive_count);
    for _ in 0..archive_count {
        archives.push(ArchiveDef {
            steps: r.u32()?,
            rows: r.u32()?,
            xff: r.f64()?,
        });
    }
    let schema = StoreSchema {
        step,
        consolidation,
        data_source,
        archives,
    };
    schema.validate()?;

    let ds = DataSourceState {
        last_update: r.u64()?,
        last_value: r.f64()?,
        pdp_value: r.f64()?,
        pdp_unknown: r.u64()?,
    };

    let mut states = Vec::with_capacity(archive_count);
    for def in &schema.archives {
        let cur_row = r.u32()?;
        let acc = r.f64()?;
        let known = r.u64()?;
        let unknown = r.u64()?;
        // Check the ring fits before allocating it.
        r.ensure(def.rows as usize * 8)?;
        let mut values = Vec::with_capacity(def.rows as usize);
        for _ in 0..def.rows {
            values.push(r.f64()?);
        }
        states.push(ArchiveState {
            cur_row,
            acc,
            known,
            unknown,
            values,
        });
    }

    if r.remaining() > 0 {
        return Err(FormatError::TrailingBytes(r.remaining()));
    }
    RoundRobinStore::from_parts(schema, ds, states)
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn ensure(&self, n: usize) -> Result<(), FormatError> {
        if self.remaining() < n {
            Err(FormatError::Truncated(self.pos))
        } else {
            Ok(())
        }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], FormatError> {
        self.ensure(n)?;
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn skip(&mut self, n: usize) -> Result<(), FormatError> {
        self.take(n).map(|_| ())
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], FormatError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, FormatError> {
        Ok(self.array::<1>()?[0])
    }

    fn u16(&mut self) -> Result<u16, FormatError> {
        self.array().map(u16::from_le_bytes)
    }

    fn u32(&mut self) -> Result<u32, FormatError> {
        self.array().map(u32::from_le_bytes)
    }

    fn u64(&mut self) -> Result<u64, FormatError> {
        self.array().map(u64::from_le_bytes)
    }

    fn f64(&mut self) -> Result<f64, FormatError> {
        self.array().map(f64::from_le_bytes)
    }
}
