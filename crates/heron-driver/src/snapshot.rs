//! Revision-aware register dump.
//!
//! Diagnostics tooling sizes a buffer with [`snapshot_len`], allocates
//! exactly that, then calls [`fill_snapshot`]. Both walk the same static
//! catalogs with the same revision predicate in the same order — that
//! identity is what makes the two-call contract safe, so any change to
//! one walk must be mirrored in the other.
//!
//! The caller serializes snapshots against device reconfiguration; there
//! is no locking here.

use heron_chip::regdump::{RegDesc, TableDesc, OWORD_LEN, REGISTERS, TABLES};
use heron_chip::revision::Revision;

use crate::regio::RegisterIo;

/// Byte length of the register dump for a device at `rev`.
///
/// Pure function of the catalogs and the revision: no I/O, no side
/// effects.
#[must_use]
pub fn snapshot_len(rev: Revision) -> usize {
    catalog_len(REGISTERS, TABLES, rev)
}

/// Fill `buf` with the register dump for a device at `rev`.
///
/// `buf` must be at least [`snapshot_len`]`(rev)` bytes; the fill trusts
/// the catalogs and does not re-verify sizes beyond the stride dispatch.
///
/// # Panics
///
/// Panics if `buf` is smaller than [`snapshot_len`]`(rev)`.
pub fn fill_snapshot<R: RegisterIo + ?Sized>(io: &R, rev: Revision, buf: &mut [u8]) {
    catalog_fill(io, REGISTERS, TABLES, rev, buf);
}

fn catalog_len(regs: &[RegDesc], tables: &[TableDesc], rev: Revision) -> usize {
    let mut len = 0;

    for reg in regs {
        if reg.exists_at(rev) {
            len += OWORD_LEN;
        }
    }

    for table in tables {
        if table.exists_at(rev) {
            len += table.rows as usize * table.row_len();
        }
    }

    len
}

fn catalog_fill<R: RegisterIo + ?Sized>(
    io: &R,
    regs: &[RegDesc],
    tables: &[TableDesc],
    rev: Revision,
    buf: &mut [u8],
) {
    let mut cursor = 0;

    for reg in regs {
        if !reg.exists_at(rev) {
            continue;
        }
        buf[cursor..cursor + OWORD_LEN].copy_from_slice(&io.read_oword(reg.offset));
        cursor += OWORD_LEN;
    }

    for table in tables {
        if !table.exists_at(rev) {
            continue;
        }

        let size = table.row_len();

        for row in 0..table.rows {
            match table.step {
                // 32-bit config table
                4 => {
                    let word = io.read_dword(table.offset + 4 * row);
                    buf[cursor..cursor + 4].copy_from_slice(&word.to_le_bytes());
                }
                // 64-bit SRAM
                8 => {
                    let qword = io.read_sram_qword(table.offset, row);
                    buf[cursor..cursor + 8].copy_from_slice(&qword.to_le_bytes());
                }
                // 128-bit-readable table
                16 => {
                    buf[cursor..cursor + 16]
                        .copy_from_slice(&io.read_oword_table(table.offset, row));
                }
                // 128-bit table, interleaved: each logical row spans two
                // physical slots and only the first is captured
                32 => {
                    buf[cursor..cursor + 16]
                        .copy_from_slice(&io.read_oword_table(table.offset, 2 * row));
                }
                step => {
                    tracing::error!(
                        offset = table.offset,
                        step,
                        "unsupported table step in register catalog, aborting dump"
                    );
                    debug_assert!(false, "unsupported table step {step}");
                    return;
                }
            }
            cursor += size;
        }
    }
}
