//! Minimal PDB encoding for predicted coordinates.

use std::fmt::Write;

use super::WriteError;
use crate::predictor::BackboneAtom;

pub const DEFAULT_CHAIN: char = 'A';

/// Backbone atom names in residue order, padded to the PDB name column.
const BACKBONE: [(&str, &str); 4] = [(" N  ", "N"), (" CA ", "C"), (" C  ", "C"), (" O  ", "O")];

/// Three-letter residue code for a one-letter amino acid.
pub fn residue_name(code: char) -> &'static str {
    match code.to_ascii_uppercase() {
        'A' => "ALA",
        'R' => "ARG",
        'N' => "ASN",
        'D' => "ASP",
        'C' => "CYS",
        'Q' => "GLN",
        'E' => "GLU",
        'G' => "GLY",
        'H' => "HIS",
        'I' => "ILE",
        'L' => "LEU",
        'K' => "LYS",
        'M' => "MET",
        'F' => "PHE",
        'P' => "PRO",
        'S' => "SER",
        'T' => "THR",
        'W' => "TRP",
        'Y' => "TYR",
        'V' => "VAL",
        _ => "UNK",
    }
}

/// Keep everything from the first `ATOM` record on, dropping headers and remarks
/// that folding services prepend.
pub fn atom_section(pdb: &str) -> Result<String, WriteError> {
    let mut lines = pdb
        .lines()
        .skip_while(|line| !line.starts_with("ATOM"))
        .peekable();

    if lines.peek().is_none() {
        return Err(WriteError::Malformed("PDB text has no ATOM records".into()));
    }

    let mut out = String::with_capacity(pdb.len());
    for line in lines {
        out.push_str(line);
        out.push('\n');
    }
    Ok(out)
}

/// Encode backbone coordinates as PDB `ATOM` records, four atoms per residue.
pub fn backbone_to_pdb(
    sequence: &str,
    atoms: &[BackboneAtom],
    chain: char,
) -> Result<String, WriteError> {
    let residues: Vec<char> = sequence.chars().collect();
    let expected = residues.len() * BACKBONE.len();
    if atoms.len() != expected {
        return Err(WriteError::Malformed(format!(
            "model output has {} atoms, expected {expected} for {} residues",
            atoms.len(),
            residues.len()
        )));
    }

    let mut out = String::with_capacity(atoms.len() * 81 + 8);
    let records = residues
        .iter()
        .enumerate()
        .flat_map(|(index, code)| BACKBONE.iter().map(move |atom| (index, *code, atom)));

    for (serial, ((index, code, (name, element)), atom)) in records.zip(atoms).enumerate() {
        // Writing into a String cannot fail.
        let _ = writeln!(
            out,
            "ATOM  {serial:>5} {name:<4} {res:>3} {chain}{res_seq:>4}    {x:>8.3}{y:>8.3}{z:>8.3}{occ:>6.2}{b:>6.2}          {element:>2}",
            serial = serial + 1,
            res = residue_name(code),
            res_seq = index + 1,
            x = atom.x,
            y = atom.y,
            z = atom.z,
            occ = atom.occupancy,
            b = atom.b_factor,
        );
    }
    out.push_str("TER\nEND\n");
    Ok(out)
}
