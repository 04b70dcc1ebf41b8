//! Fixed-size binary slot layout of one record.
//!
//! ```text
//! offset  size  field
//!      0     4  roll        i32 LE
//!      4   100  name        UTF-8, NUL padded
//!    104    24  marks       6 x i32 LE
//!    128     4  total       i32 LE
//!    132     4  percentage  f32 LE
//!    136    20  grade       ASCII label, NUL padded
//! ```
//!
//! Files carry no header or delimiter; a file is `n * SLOT_SIZE` bytes.

use tracing::warn;

use crate::record::{Grade, Marks, StudentRecord, GRADE_CAPACITY, NAME_CAPACITY, SUBJECT_COUNT};

const ROLL_OFFSET: usize = 0;
const NAME_OFFSET: usize = ROLL_OFFSET + 4;
const MARKS_OFFSET: usize = NAME_OFFSET + NAME_CAPACITY;
const TOTAL_OFFSET: usize = MARKS_OFFSET + 4 * SUBJECT_COUNT;
const PERCENTAGE_OFFSET: usize = TOTAL_OFFSET + 4;
const GRADE_OFFSET: usize = PERCENTAGE_OFFSET + 4;

pub const SLOT_SIZE: usize = GRADE_OFFSET + GRADE_CAPACITY;

pub fn encode(record: &StudentRecord) -> [u8; SLOT_SIZE] {
    let mut slot = [0u8; SLOT_SIZE];
    put_i32(&mut slot, ROLL_OFFSET, record.roll);
    put_text(&mut slot[NAME_OFFSET..MARKS_OFFSET], &record.name);
    for (i, m) in record.marks.iter().enumerate() {
        put_i32(&mut slot, MARKS_OFFSET + 4 * i, *m);
    }
    put_i32(&mut slot, TOTAL_OFFSET, record.total);
    slot[PERCENTAGE_OFFSET..PERCENTAGE_OFFSET + 4]
        .copy_from_slice(&record.percentage.to_le_bytes());
    put_text(&mut slot[GRADE_OFFSET..SLOT_SIZE], record.grade.label());
    slot
}

/// Decodes one slot. `bytes` must be exactly `SLOT_SIZE` long.
pub fn decode(bytes: &[u8]) -> StudentRecord {
    debug_assert_eq!(bytes.len(), SLOT_SIZE);

    let mut marks: Marks = [0; SUBJECT_COUNT];
    for (i, m) in marks.iter_mut().enumerate() {
        *m = get_i32(bytes, MARKS_OFFSET + 4 * i);
    }
    let percentage = f32::from_le_bytes(word(bytes, PERCENTAGE_OFFSET));
    let label = get_text(&bytes[GRADE_OFFSET..SLOT_SIZE]);
    let grade = match Grade::from_label(&label) {
        Some(g) => g,
        None => {
            let derived = Grade::classify(percentage);
            warn!(
                label = %label,
                derived = derived.label(),
                "unknown grade label in slot; deriving from stored percentage"
            );
            derived
        }
    };

    StudentRecord {
        roll: get_i32(bytes, ROLL_OFFSET),
        name: get_text(&bytes[NAME_OFFSET..MARKS_OFFSET]),
        marks,
        total: get_i32(bytes, TOTAL_OFFSET),
        percentage,
        grade,
    }
}

fn word(bytes: &[u8], offset: usize) -> [u8; 4] {
    let mut w = [0u8; 4];
    w.copy_from_slice(&bytes[offset..offset + 4]);
    w
}

fn get_i32(bytes: &[u8], offset: usize) -> i32 {
    i32::from_le_bytes(word(bytes, offset))
}

fn put_i32(slot: &mut [u8], offset: usize, v: i32) {
    slot[offset..offset + 4].copy_from_slice(&v.to_le_bytes());
}

/// Copies `text` into a NUL-padded buffer, keeping at least one NUL and
/// cutting on a char boundary.
fn put_text(buf: &mut [u8], text: &str) {
    let mut end = text.len().min(buf.len() - 1);
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    buf[..end].copy_from_slice(&text.as_bytes()[..end]);
}

fn get_text(buf: &[u8]) -> String {
    let end = buf.iter().position(|b| *b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}
