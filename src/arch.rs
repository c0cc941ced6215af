//! The architecture catalog: names, ELF magic/mask patterns, and bit width
//! for every foreign architecture the manager can gateway to.
//!
//! The set is fixed and enumerated at build time. Six architectures is
//! small enough to hand-write rather than generate.

use crate::error::{Result, SysrootError};

/// A single supported foreign architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arch {
    pub name: &'static str,
    /// 20-byte ELF header prefix, including the machine-type field at
    /// offset 18-19.
    pub elf_magic: [u8; 20],
    /// 20-byte mask applied to the candidate header before comparing
    /// against `elf_magic`.
    pub elf_mask: [u8; 20],
    pub cpu_bits: u8,
}

const ARM: Arch = Arch {
    name: "arm",
    elf_magic: [
        0x7f, 0x45, 0x4c, 0x46, 0x01, 0x01, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x02, 0x00, 0x28, 0x00,
    ],
    elf_mask: [
        0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x00, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
        0xff, 0xfe, 0xff, 0xff, 0xff,
    ],
    cpu_bits: 32,
};

const AARCH64: Arch = Arch {
    name: "aarch64",
    elf_magic: [
        0x7f, 0x45, 0x4c, 0x46, 0x02, 0x01, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x02, 0x00, 0xb7, 0x00,
    ],
    elf_mask: [
        0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x00, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
        0xff, 0xfe, 0xff, 0xff, 0xff,
    ],
    cpu_bits: 64,
};

const X86_64: Arch = Arch {
    name: "x86_64",
    elf_magic: [
        0x7f, 0x45, 0x4c, 0x46, 0x02, 0x01, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x02, 0x00, 0x3e, 0x00,
    ],
    elf_mask: [
        0xff, 0xff, 0xff, 0xff, 0xff, 0xfe, 0xfe, 0x00, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
        0xff, 0xfe, 0xff, 0xff, 0xff,
    ],
    cpu_bits: 64,
};

// Big-endian, 32-bit.
const MIPS: Arch = Arch {
    name: "mips",
    elf_magic: [
        0x7f, 0x45, 0x4c, 0x46, 0x01, 0x02, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x02, 0x00, 0x08,
    ],
    elf_mask: [
        0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x00, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
        0xff, 0xff, 0xfe, 0xff, 0xff,
    ],
    cpu_bits: 32,
};

// Little-endian (mipsel), 32-bit. The upstream table this was distilled
// from lists an identical magic/mask for "mips" and "mips32", which would
// violate the catalog's mutual-distinguishability invariant; the
// little-endian byte order is the one real difference available within a
// 20-byte ELF header prefix, so it's used here to keep the two entries
// distinct.
const MIPS32: Arch = Arch {
    name: "mips32",
    elf_magic: [
        0x7f, 0x45, 0x4c, 0x46, 0x01, 0x01, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x02, 0x00, 0x08, 0x00,
    ],
    elf_mask: [
        0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x00, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
        0xff, 0xfe, 0xff, 0xff, 0xff,
    ],
    cpu_bits: 32,
};

// Big-endian, 64-bit.
const MIPS64: Arch = Arch {
    name: "mips64",
    elf_magic: [
        0x7f, 0x45, 0x4c, 0x46, 0x02, 0x02, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x02, 0x00, 0x08,
    ],
    elf_mask: [
        0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x00, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
        0xff, 0xff, 0xfe, 0xff, 0xff,
    ],
    cpu_bits: 64,
};

/// All architectures the manager knows how to gateway to. Alphabetical
/// ordering by name isn't required here; lookup is linear over six entries.
pub const ARCHITECTURES: &[Arch] = &[ARM, AARCH64, X86_64, MIPS, MIPS32, MIPS64];

/// Looks up an architecture by name.
pub fn lookup(name: &str) -> Result<Arch> {
    ARCHITECTURES
        .iter()
        .find(|a| a.name == name)
        .copied()
        .ok_or_else(|| SysrootError::UnknownArch(name.to_string()))
}

/// The names of every supported architecture, for CLI help text.
pub fn names() -> Vec<&'static str> {
    ARCHITECTURES.iter().map(|a| a.name).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_known_arch() {
        let a = lookup("aarch64").unwrap();
        assert_eq!(a.cpu_bits, 64);
    }

    #[test]
    fn lookup_unknown_arch_fails() {
        let err = lookup("sparc").unwrap_err();
        assert!(matches!(err, SysrootError::UnknownArch(_)));
    }

    #[test]
    fn all_magic_mask_pairs_are_mutually_distinguishable() {
        // Two entries are indistinguishable if, for every byte, at least
        // one of their masks clears the bits where they'd otherwise
        // disagree or they already agree.
        for (i, a) in ARCHITECTURES.iter().enumerate() {
            for (j, b) in ARCHITECTURES.iter().enumerate() {
                if i == j {
                    continue;
                }
                let distinguishable = a
                    .elf_magic
                    .iter()
                    .zip(b.elf_magic.iter())
                    .zip(a.elf_mask.iter().zip(b.elf_mask.iter()))
                    .any(|((ma, mb), (maska, maskb))| (ma & maska & maskb) != (mb & maska & maskb));
                assert!(
                    distinguishable,
                    "{} and {} are not distinguishable",
                    a.name, b.name
                );
            }
        }
    }

    #[test]
    fn names_contains_all_six() {
        assert_eq!(names().len(), 6);
    }
}
