use byteorder::{BigEndian, ByteOrder};

use crate::{Error, Result};

/// Fixed prefix of every entry: mark (1) + key_len (4) + val_len (4).
pub const ENTRY_HEADER_SIZE: usize = 9;
/// Fixed prefix of every hint record: fid (4) + offset (4) + key_len (4).
pub const HINT_HEADER_SIZE: usize = 12;

/// Distinguishes live data from deletion markers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mark {
    Normal,
    Tombstone,
}

impl Mark {
    fn from_byte(b: u8) -> Mark {
        if b == 1 {
            Mark::Tombstone
        } else {
            Mark::Normal
        }
    }

    fn as_byte(self) -> u8 {
        match self {
            Mark::Normal => 0,
            Mark::Tombstone => 1,
        }
    }
}

/// One key/value record as it appears on disk.
///
/// Lengths are kept alongside the payload so that a header-only decode (the
/// first 9 bytes) still reports how much payload follows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    mark: Mark,
    klen: u32,
    vlen: u32,
    key: Vec<u8>,
    value: Vec<u8>,
}

impl Entry {
    /// A normal put of `key` to `value`.
    pub fn put(key: &[u8], value: &[u8]) -> Entry {
        Entry {
            mark: Mark::Normal,
            klen: key.len() as u32,
            vlen: value.len() as u32,
            key: key.to_vec(),
            value: value.to_vec(),
        }
    }

    /// A deletion marker for `key`.
    pub fn tombstone(key: &[u8]) -> Entry {
        Entry {
            mark: Mark::Tombstone,
            klen: key.len() as u32,
            vlen: 0,
            key: key.to_vec(),
            value: Vec::new(),
        }
    }

    pub fn mark(&self) -> Mark {
        self.mark
    }

    pub fn is_tombstone(&self) -> bool {
        self.mark == Mark::Tombstone
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Consumes the entry, yielding just the value bytes.
    pub fn into_value(self) -> Vec<u8> {
        self.value
    }

    pub fn klen(&self) -> u32 {
        self.klen
    }

    pub fn vlen(&self) -> u32 {
        self.vlen
    }

    /// Bytes this entry occupies on disk.
    pub fn size(&self) -> u32 {
        ENTRY_HEADER_SIZE as u32 + self.klen + self.vlen
    }

    /// Serializes the entry into a fresh buffer of exactly `self.size()` bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; self.size() as usize];
        buf[0] = self.mark.as_byte();
        BigEndian::write_u32(&mut buf[1..5], self.klen);
        BigEndian::write_u32(&mut buf[5..9], self.vlen);
        buf[ENTRY_HEADER_SIZE..ENTRY_HEADER_SIZE + self.key.len()].copy_from_slice(&self.key);
        buf[ENTRY_HEADER_SIZE + self.key.len()..].copy_from_slice(&self.value);
        buf
    }

    /// Deserializes an entry from `buf`.
    ///
    /// A buffer of exactly [`ENTRY_HEADER_SIZE`] bytes decodes to a
    /// header-only probe: lengths populated, key and value empty. A longer
    /// buffer must contain the full payload.
    pub fn decode(buf: &[u8]) -> Result<Entry> {
        if buf.len() < ENTRY_HEADER_SIZE {
            return Err(Error::CorruptEntry(format!(
                "header needs {} bytes, got {}",
                ENTRY_HEADER_SIZE,
                buf.len()
            )));
        }
        let mark = Mark::from_byte(buf[0]);
        let klen = BigEndian::read_u32(&buf[1..5]);
        let vlen = BigEndian::read_u32(&buf[5..9]);

        let mut e = Entry {
            mark,
            klen,
            vlen,
            key: Vec::new(),
            value: Vec::new(),
        };
        if buf.len() > ENTRY_HEADER_SIZE {
            let need = ENTRY_HEADER_SIZE + klen as usize + vlen as usize;
            if buf.len() < need {
                return Err(Error::CorruptEntry(format!(
                    "payload needs {} bytes, got {}",
                    need,
                    buf.len()
                )));
            }
            e.key = buf[ENTRY_HEADER_SIZE..ENTRY_HEADER_SIZE + klen as usize].to_vec();
            e.value = buf
                [ENTRY_HEADER_SIZE + klen as usize..ENTRY_HEADER_SIZE + (klen + vlen) as usize]
                .to_vec();
        }
        Ok(e)
    }

    /// Attaches the payload bytes read separately from the header.
    pub(crate) fn set_payload(&mut self, mut buf: Vec<u8>) {
        self.value = buf.split_off(self.klen as usize);
        self.key = buf;
    }
}

/// One record of a hint file: where the live version of `key` sits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HintRecord {
    fid: u32,
    offset: u32,
    klen: u32,
    key: Vec<u8>,
}

impl HintRecord {
    pub fn new(fid: u32, offset: u32, key: &[u8]) -> HintRecord {
        HintRecord {
            fid,
            offset,
            klen: key.len() as u32,
            key: key.to_vec(),
        }
    }

    pub fn fid(&self) -> u32 {
        self.fid
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn klen(&self) -> u32 {
        self.klen
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// Bytes this record occupies on disk.
    pub fn size(&self) -> u32 {
        HINT_HEADER_SIZE as u32 + self.klen
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; self.size() as usize];
        BigEndian::write_u32(&mut buf[..4], self.fid);
        BigEndian::write_u32(&mut buf[4..8], self.offset);
        BigEndian::write_u32(&mut buf[8..12], self.klen);
        buf[HINT_HEADER_SIZE..].copy_from_slice(&self.key);
        buf
    }

    /// Deserializes a record from `buf`. A buffer of exactly
    /// [`HINT_HEADER_SIZE`] bytes decodes to a header-only probe with an
    /// empty key.
    pub fn decode(buf: &[u8]) -> Result<HintRecord> {
        if buf.len() < HINT_HEADER_SIZE {
            return Err(Error::CorruptHint(format!(
                "header needs {} bytes, got {}",
                HINT_HEADER_SIZE,
                buf.len()
            )));
        }
        let fid = BigEndian::read_u32(&buf[..4]);
        let offset = BigEndian::read_u32(&buf[4..8]);
        let klen = BigEndian::read_u32(&buf[8..12]);

        let mut rec = HintRecord {
            fid,
            offset,
            klen,
            key: Vec::new(),
        };
        if buf.len() > HINT_HEADER_SIZE {
            let need = HINT_HEADER_SIZE + klen as usize;
            if buf.len() < need {
                return Err(Error::CorruptHint(format!(
                    "key needs {} bytes, got {}",
                    need,
                    buf.len()
                )));
            }
            rec.key = buf[HINT_HEADER_SIZE..need].to_vec();
        }
        Ok(rec)
    }
}
