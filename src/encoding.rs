//! Nucleotide and amino acid alphabets and the genetic code.
//!
//! Nucleotides are packed two bits per base, so their discriminants double as
//! the packed representation. Codons are indexed as `(n1 << 4) | (n2 << 2) | n3`.

use phf::phf_map;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Nucleotide {
    A = 0,
    U = 1,
    G = 2,
    C = 3,
}

/// Letters accepted when decoding a genotype. `T` is read as `U`.
pub static NUCLEOTIDE_DECODE: phf::Map<char, Nucleotide> = phf_map! {
    'A' => Nucleotide::A,
    'a' => Nucleotide::A,
    'U' => Nucleotide::U,
    'u' => Nucleotide::U,
    'T' => Nucleotide::U,
    't' => Nucleotide::U,
    'G' => Nucleotide::G,
    'g' => Nucleotide::G,
    'C' => Nucleotide::C,
    'c' => Nucleotide::C,
};

impl Nucleotide {
    pub const SIZE: usize = 4;

    /// Decode the two low bits of a packed value.
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => Nucleotide::A,
            1 => Nucleotide::U,
            2 => Nucleotide::G,
            _ => Nucleotide::C,
        }
    }

    pub const fn bits(self) -> u8 {
        self as u8
    }

    pub fn try_decode(letter: char) -> Option<Self> {
        NUCLEOTIDE_DECODE.get(&letter).copied()
    }

    pub const fn encode(self) -> char {
        match self {
            Nucleotide::A => 'A',
            Nucleotide::U => 'U',
            Nucleotide::G => 'G',
            Nucleotide::C => 'C',
        }
    }
}

impl fmt::Display for Nucleotide {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum AminoAcid {
    Ala = 0,
    Arg,
    Asn,
    Asp,
    Cys,
    Gln,
    Glu,
    Gly,
    His,
    Ile,
    Leu,
    Lys,
    Met,
    Phe,
    Pro,
    Ser,
    Thr,
    Trp,
    Tyr,
    Val,
    Stop,
}

impl AminoAcid {
    /// Number of residues, not counting the stop symbol.
    pub const RESIDUES: usize = 20;

    const SYMBOLS: [char; 21] = [
        'A', 'R', 'N', 'D', 'C', 'Q', 'E', 'G', 'H', 'I', 'L', 'K', 'M', 'F', 'P', 'S', 'T',
        'W', 'Y', 'V', '.',
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn is_stop(self) -> bool {
        matches!(self, AminoAcid::Stop)
    }

    pub const fn symbol(self) -> char {
        Self::SYMBOLS[self as usize]
    }
}

impl fmt::Display for AminoAcid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

pub const fn codon_index(n1: Nucleotide, n2: Nucleotide, n3: Nucleotide) -> usize {
    ((n1 as usize) << 4) | ((n2 as usize) << 2) | (n3 as usize)
}

/// The standard genetic code, indexed by [`codon_index`].
pub static CODON_TABLE: [AminoAcid; 64] = build_codon_table();

const fn build_codon_table() -> [AminoAcid; 64] {
    use AminoAcid::*;
    use Nucleotide::{A, C, G, U};

    let mut table = [Stop; 64];
    table[codon_index(U, U, U)] = Phe;
    table[codon_index(U, U, C)] = Phe;
    table[codon_index(U, U, A)] = Leu;
    table[codon_index(U, U, G)] = Leu;
    table[codon_index(U, C, U)] = Ser;
    table[codon_index(U, C, C)] = Ser;
    table[codon_index(U, C, A)] = Ser;
    table[codon_index(U, C, G)] = Ser;
    table[codon_index(U, A, U)] = Tyr;
    table[codon_index(U, A, C)] = Tyr;
    table[codon_index(U, A, A)] = Stop;
    table[codon_index(U, A, G)] = Stop;
    table[codon_index(U, G, U)] = Cys;
    table[codon_index(U, G, C)] = Cys;
    table[codon_index(U, G, A)] = Stop;
    table[codon_index(U, G, G)] = Trp;
    table[codon_index(C, U, U)] = Leu;
    table[codon_index(C, U, C)] = Leu;
    table[codon_index(C, U, A)] = Leu;
    table[codon_index(C, U, G)] = Leu;
    table[codon_index(C, C, U)] = Pro;
    table[codon_index(C, C, C)] = Pro;
    table[codon_index(C, C, A)] = Pro;
    table[codon_index(C, C, G)] = Pro;
    table[codon_index(C, A, U)] = His;
    table[codon_index(C, A, C)] = His;
    table[codon_index(C, A, A)] = Gln;
    table[codon_index(C, A, G)] = Gln;
    table[codon_index(C, G, U)] = Arg;
    table[codon_index(C, G, C)] = Arg;
    table[codon_index(C, G, A)] = Arg;
    table[codon_index(C, G, G)] = Arg;
    table[codon_index(A, U, U)] = Ile;
    table[codon_index(A, U, C)] = Ile;
    table[codon_index(A, U, A)] = Ile;
    table[codon_index(A, U, G)] = Met;
    table[codon_index(A, C, U)] = Thr;
    table[codon_index(A, C, C)] = Thr;
    table[codon_index(A, C, A)] = Thr;
    table[codon_index(A, C, G)] = Thr;
    table[codon_index(A, A, U)] = Asn;
    table[codon_index(A, A, C)] = Asn;
    table[codon_index(A, A, A)] = Lys;
    table[codon_index(A, A, G)] = Lys;
    table[codon_index(A, G, U)] = Ser;
    table[codon_index(A, G, C)] = Ser;
    table[codon_index(A, G, A)] = Arg;
    table[codon_index(A, G, G)] = Arg;
    table[codon_index(G, U, U)] = Val;
    table[codon_index(G, U, C)] = Val;
    table[codon_index(G, U, A)] = Val;
    table[codon_index(G, U, G)] = Val;
    table[codon_index(G, C, U)] = Ala;
    table[codon_index(G, C, C)] = Ala;
    table[codon_index(G, C, A)] = Ala;
    table[codon_index(G, C, G)] = Ala;
    table[codon_index(G, A, U)] = Asp;
    table[codon_index(G, A, C)] = Asp;
    table[codon_index(G, A, A)] = Glu;
    table[codon_index(G, A, G)] = Glu;
    table[codon_index(G, G, U)] = Gly;
    table[codon_index(G, G, C)] = Gly;
    table[codon_index(G, G, A)] = Gly;
    table[codon_index(G, G, G)] = Gly;
    table
}

pub fn translate(n1: Nucleotide, n2: Nucleotide, n3: Nucleotide) -> AminoAcid {
    CODON_TABLE[codon_index(n1, n2, n3)]
}
