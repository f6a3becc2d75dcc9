use crate::types::{Layer, Level, LogEntry};

/// Size of one trace record on the wire.
pub const RECORD_SIZE: usize = 12;

/// First byte of a record slot the device left empty.
pub const EMPTY_SLOT: u8 = 0xFF;

const PAYLOAD_SIZE: usize = 9;

/// Fields of one record before it is placed in a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedRecord {
    pub event: u16,
    pub layer: Layer,
    pub level: Level,
    pub payload: [u8; PAYLOAD_SIZE],
}

impl DecodedRecord {
    fn into_entry(self, index: u64, time: u64) -> LogEntry {
        LogEntry {
            time,
            index,
            event: self.event,
            layer: self.layer,
            level: self.level,
            payload: format_payload(&self.payload),
        }
    }
}

/// Decodes every whole record in `raw`.
///
/// Empty slots are skipped without consuming an index, so the returned
/// entries are numbered `next_index..next_index + len`. A trailing fragment
/// shorter than [`RECORD_SIZE`] is ignored. All entries of a batch share
/// `time`.
pub fn decode_batch(raw: &[u8], next_index: u64, time: u64) -> Vec<LogEntry> {
    raw.chunks_exact(RECORD_SIZE)
        .filter_map(|chunk| <&[u8; RECORD_SIZE]>::try_from(chunk).ok())
        .filter_map(decode_record)
        .zip(next_index..)
        .map(|(record, index)| record.into_entry(index, time))
        .collect()
}

/// Decodes one record, or `None` for an empty slot.
///
/// The header is byte 1 (high) followed by byte 0 (low). Reading it most
/// significant bit first: bits 0..2 are the level, bit 2 is unused, bits
/// 3..6 are the layer field and bits 6..16 the event id. The payload is
/// byte 2 followed by bytes 4..12; byte 3 is reserved.
pub fn decode_record(record: &[u8; RECORD_SIZE]) -> Option<DecodedRecord> {
    if record[0] == EMPTY_SLOT {
        return None;
    }

    let header = u16::from_le_bytes([record[0], record[1]]);

    let mut payload = [0u8; PAYLOAD_SIZE];
    payload[0] = record[2];
    payload[1..].copy_from_slice(&record[4..]);

    Some(DecodedRecord {
        event: header & 0x03FF,
        layer: Layer::from_field(((header >> 10) & 0x7) as u8),
        level: Level::from_field((header >> 14) as u8),
        payload,
    })
}

/// Builds the two header bytes (byte 0, byte 1) for a record.
pub fn encode_header(level: Level, layer: Layer, event: u16) -> [u8; 2] {
    let header = (u16::from(level.field()) << 14)
        | (u16::from(layer.field()) << 10)
        | (event & 0x03FF);
    header.to_le_bytes()
}

pub fn format_payload(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|byte| format!("{:02X}", byte))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(level: Level, layer: Layer, event: u16, payload: [u8; 10]) -> Vec<u8> {
        let header = encode_header(level, layer, event);
        let mut raw = header.to_vec();
        raw.extend_from_slice(&payload);
        raw
    }

    #[test]
    fn decodes_reference_record() {
        let raw = [0x01, 0x20, 0xAB, 0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        let entries = decode_batch(&raw, 0, 0);

        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        // 0x2001 = 0b00_1_000_0000000001
        assert_eq!(entry.level, Level::Error);
        assert_eq!(entry.layer, Layer::Unknown);
        assert_eq!(entry.layer.value(), -1);
        assert_eq!(entry.event, 1);
        assert_eq!(entry.payload, "AB 01 02 03 04 05 06 07 08");
    }

    #[test]
    fn header_fields_survive_encoding() {
        for level in Level::ALL {
            for layer in Layer::KNOWN {
                for event in [0u16, 1, 63, 64, 511, 1023] {
                    let raw = record(level, layer, event, [0; 10]);
                    if raw[0] == EMPTY_SLOT {
                        continue;
                    }
                    let decoded = decode_record(raw.as_slice().try_into().unwrap()).unwrap();
                    assert_eq!((decoded.level, decoded.layer, decoded.event), (level, layer, event));
                }
            }
        }
    }

    #[test]
    fn unused_header_bit_is_ignored() {
        let mut raw = record(Level::Info, Layer::Data, 300, [0; 10]);
        raw[1] |= 0x20;
        let decoded = decode_record(raw.as_slice().try_into().unwrap()).unwrap();
        assert_eq!((decoded.level, decoded.layer, decoded.event), (Level::Info, Layer::Data, 300));
    }

    #[test]
    fn reserved_byte_is_dropped_from_payload() {
        let raw = record(Level::Verbose, Layer::Comm, 5, [0x10, 0xEE, 1, 2, 3, 4, 5, 6, 7, 8]);
        let entries = decode_batch(&raw, 0, 0);
        assert_eq!(entries[0].payload, "10 01 02 03 04 05 06 07 08");
    }

    #[test]
    fn empty_slots_do_not_consume_indices() {
        let mut raw = record(Level::Info, Layer::Physical, 7, [0; 10]);
        raw.extend_from_slice(&[0xFF; RECORD_SIZE]);
        raw.extend(record(Level::Warning, Layer::Control, 8, [0; 10]));

        let entries = decode_batch(&raw, 41, 250);

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].index, 41);
        assert_eq!(entries[1].index, 42);
        assert_eq!(entries[1].event, 8);
        assert!(entries.iter().all(|entry| entry.time == 250));
    }

    #[test]
    fn batch_of_record_then_empty_slot_yields_one_entry() {
        let mut raw = record(Level::Error, Layer::Express, 2, [0; 10]);
        raw.extend_from_slice(&[0xFF, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        let entries = decode_batch(&raw, 3, 0);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].index, 3);
    }

    #[test]
    fn trailing_fragment_is_ignored() {
        let mut raw = record(Level::Info, Layer::Mgmt, 9, [0; 10]);
        raw.extend_from_slice(&[0x01, 0x04, 0x00]);
        let entries = decode_batch(&raw, 0, 0);
        assert_eq!(entries.len(), 1);
        assert!(decode_batch(&raw[..11], 0, 0).is_empty());
    }

    #[test]
    fn payload_formatting_pads_and_uppercases() {
        assert_eq!(format_payload(&[0x0a, 0xff, 0x00]), "0A FF 00");
        assert_eq!(format_payload(&[]), "");
    }
}
