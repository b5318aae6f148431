//! Target memory access.
//!
//! Every decode goes through [`TargetMemory`], which is implemented by the
//! debug transport in a live session and by [`MemorySnapshot`] when decoding
//! offline or under test. Reads are blocking and either complete fully or fail.

use std::collections::BTreeMap;

use crate::{Error, Result};

/// Read access to target memory. Target words are little-endian.
pub trait TargetMemory {
    /// Fill `data` with target memory starting at `address`.
    fn read(&mut self, address: u64, data: &mut [u8]) -> Result<()>;

    /// Read one 32-bit little-endian word.
    fn read_word_32(&mut self, address: u64) -> Result<u32> {
        let mut word = [0; 4];
        self.read(address, &mut word)?;
        Ok(u32::from_le_bytes(word))
    }
}

impl<T: TargetMemory + ?Sized> TargetMemory for &mut T {
    fn read(&mut self, address: u64, data: &mut [u8]) -> Result<()> {
        (**self).read(address, data)
    }
}

/// Sparse image of target memory.
///
/// Inserting bytes behaves like writing target memory: they overwrite whatever
/// was stored at the same addresses before, and touching or overlapping
/// regions are merged. Regions never overlap, so a read succeeds exactly when
/// one region holds every requested byte.
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshot {
    regions: BTreeMap<u64, Vec<u8>>,
}

impl MemorySnapshot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_region(mut self, address: u64, data: Vec<u8>) -> Self {
        self.insert(address, data);
        self
    }

    /// Store `data` at `address`, replacing any bytes already stored there.
    pub fn insert(&mut self, address: u64, data: Vec<u8>) {
        if data.is_empty() {
            return;
        }
        let end = address.saturating_add(data.len() as u64);

        let touching: Vec<(u64, u64)> = self
            .regions
            .range(..=end)
            .map(|(&start, region)| (start, start.saturating_add(region.len() as u64)))
            .filter(|&(_, region_end)| region_end >= address)
            .collect();
        if touching.is_empty() {
            self.regions.insert(address, data);
            return;
        }

        let merged_start = touching[0].0.min(address);
        let merged_end = touching
            .iter()
            .map(|&(_, region_end)| region_end)
            .fold(end, u64::max);
        let mut merged = vec![0; (merged_end - merged_start) as usize];
        for (start, _) in touching {
            if let Some(region) = self.regions.remove(&start) {
                let offset = (start - merged_start) as usize;
                merged[offset..offset + region.len()].copy_from_slice(&region);
            }
        }
        let offset = (address - merged_start) as usize;
        merged[offset..offset + data.len()].copy_from_slice(&data);
        self.regions.insert(merged_start, merged);
    }

    /// Store a little-endian word.
    pub fn write_word_32(&mut self, address: u64, value: u32) {
        self.insert(address, value.to_le_bytes().to_vec());
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Parse the text snapshot format.
    ///
    /// One region per line, `address: bytes`, where the address is hex with an
    /// optional `0x` prefix and the bytes are hex pairs, optionally separated by
    /// whitespace:
    ///
    /// ```text
    /// # task 1 stack
    /// 0x3ffb8000: 00 00 00 00 1c 40 0d 40
    /// 3ffb8008: 20000600
    /// ```
    pub fn parse(text: &str) -> Result<Self> {
        let mut snapshot = Self::new();

        for (index, line) in text.lines().enumerate() {
            let line_num = index + 1;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (address, bytes) = line.split_once(':').ok_or_else(|| Error::Snapshot {
                line: line_num,
                message: "expected 'address: bytes'".to_string(),
            })?;

            let address = parse_hex_u64(address.trim()).ok_or_else(|| Error::Snapshot {
                line: line_num,
                message: format!("invalid address '{}'", address.trim()),
            })?;

            let data = parse_hex_bytes(bytes).map_err(|message| Error::Snapshot {
                line: line_num,
                message,
            })?;

            snapshot.insert(address, data);
        }

        Ok(snapshot)
    }
}

impl TargetMemory for MemorySnapshot {
    fn read(&mut self, address: u64, data: &mut [u8]) -> Result<()> {
        let len = data.len();
        if len == 0 {
            return Ok(());
        }
        let fail = move || Error::MemoryRead { address, len };

        let (start, region) = self.regions.range(..=address).next_back().ok_or_else(fail)?;
        let offset = usize::try_from(address - start).map_err(|_| fail())?;
        let bytes = offset
            .checked_add(len)
            .and_then(|end| region.get(offset..end))
            .ok_or_else(fail)?;
        data.copy_from_slice(bytes);
        Ok(())
    }
}

fn parse_hex_u64(text: &str) -> Option<u64> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    u64::from_str_radix(digits, 16).ok()
}

fn parse_hex_bytes(text: &str) -> std::result::Result<Vec<u8>, String> {
    let digits: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();
    if digits.is_empty() {
        return Err("region has no bytes".to_string());
    }
    if digits.len() % 2 != 0 {
        return Err("odd number of hex digits".to_string());
    }

    digits
        .chunks(2)
        .map(|pair| {
            let hi = pair[0].to_digit(16);
            let lo = pair[1].to_digit(16);
            match (hi, lo) {
                (Some(hi), Some(lo)) => Ok((hi * 16 + lo) as u8),
                _ => Err(format!("invalid hex byte '{}{}'", pair[0], pair[1])),
            }
        })
        .collect()
}
