//! Shared fixtures: hand-built PE32 images and stub models.

#![allow(dead_code)]

use hybrid_scan::config::{ExtractionConfig, FusionConfig};
use hybrid_scan::error::ScoringError;
use hybrid_scan::features::FeatureSchema;
use hybrid_scan::model::{
    AnomalyModel, ClassifierModel, ModelArtifacts, PredictedLabel, ProbabilisticClassifier,
    RawPrediction, Reconstructor, StandardScaler,
};
use hybrid_scan::risk::VerdictEngine;
use hybrid_scan::scan::ScanContext;
use std::sync::Arc;

pub const PE_POINTER: usize = 0x80;
pub const FILE_ALIGNMENT: usize = 0x200;
/// Offset of the section table in every image `build_pe` produces.
pub const SECTION_TABLE: usize = PE_POINTER + 4 + 20 + 28 + 68 + 16 * 8;
pub const CERTIFICATE_DIRECTORY: usize = 4;
const IMPORT_DIRECTORY: usize = 1;
pub const TEXT_CHARACTERISTICS: u32 = 0x6000_0020; // code | execute | read
pub const DATA_CHARACTERISTICS: u32 = 0xC000_0040; // initialized data | read | write

#[derive(Clone, Copy)]
pub struct Section<'a> {
    pub name: &'a str,
    pub characteristics: u32,
    /// Padded with zeros to the file alignment.
    pub raw: &'a [u8],
}

fn put_u16(buf: &mut [u8], at: usize, v: u16) {
    buf[at..at + 2].copy_from_slice(&v.to_le_bytes());
}

fn put_u32(buf: &mut [u8], at: usize, v: u32) {
    buf[at..at + 4].copy_from_slice(&v.to_le_bytes());
}

/// A minimal PE32 GUI executable with the given sections and no imports.
pub fn build_pe(sections: &[Section<'_>]) -> Vec<u8> {
    let coff = PE_POINTER + 4;
    let optional = coff + 20;
    let optional_len = 28 + 68 + 16 * 8;
    let table = optional + optional_len;
    debug_assert_eq!(table, SECTION_TABLE);
    let headers_end = table + sections.len() * 40;
    let size_of_headers = headers_end.div_ceil(FILE_ALIGNMENT) * FILE_ALIGNMENT;
    let raw_sizes: Vec<usize> = sections
        .iter()
        .map(|s| s.raw.len().max(1).div_ceil(FILE_ALIGNMENT) * FILE_ALIGNMENT)
        .collect();
    let total = size_of_headers + raw_sizes.iter().sum::<usize>();
    let mut buf = vec![0u8; total];

    // DOS header
    buf[0] = b'M';
    buf[1] = b'Z';
    put_u32(&mut buf, 0x3c, PE_POINTER as u32);

    // PE signature + COFF header
    buf[PE_POINTER..PE_POINTER + 4].copy_from_slice(b"PE\0\0");
    put_u16(&mut buf, coff, 0x14c);
    put_u16(&mut buf, coff + 2, sections.len() as u16);
    put_u32(&mut buf, coff + 4, 0x5f00_0000);
    put_u16(&mut buf, coff + 16, optional_len as u16);
    put_u16(&mut buf, coff + 18, 0x0102);

    // Optional header, standard fields
    put_u16(&mut buf, optional, 0x10b);
    put_u32(&mut buf, optional + 16, 0x1000); // entry point
    put_u32(&mut buf, optional + 20, 0x1000); // base of code
    // Windows fields
    let win = optional + 28;
    put_u32(&mut buf, win, 0x0040_0000); // image base
    put_u32(&mut buf, win + 4, 0x1000); // section alignment
    put_u32(&mut buf, win + 8, FILE_ALIGNMENT as u32);
    put_u16(&mut buf, win + 12, 6); // major OS version
    put_u16(&mut buf, win + 20, 6); // major subsystem version
    put_u32(&mut buf, win + 28, (0x1000 * (sections.len() + 1)) as u32); // size of image
    put_u32(&mut buf, win + 32, size_of_headers as u32);
    put_u16(&mut buf, win + 40, 2); // GUI subsystem
    put_u16(&mut buf, win + 42, 0x8140);
    put_u32(&mut buf, win + 64, 16); // number of data directories, all empty

    // Section table and raw data
    let mut raw_ptr = size_of_headers;
    for (i, (s, &raw_size)) in sections.iter().zip(&raw_sizes).enumerate() {
        let e = table + i * 40;
        let name = s.name.as_bytes();
        buf[e..e + name.len().min(8)].copy_from_slice(&name[..name.len().min(8)]);
        put_u32(&mut buf, e + 8, raw_size as u32); // virtual size
        put_u32(&mut buf, e + 12, (0x1000 * (i + 1)) as u32);
        put_u32(&mut buf, e + 16, raw_size as u32);
        put_u32(&mut buf, e + 20, raw_ptr as u32);
        put_u32(&mut buf, e + 36, s.characteristics);
        buf[raw_ptr..raw_ptr + s.raw.len()].copy_from_slice(s.raw);
        raw_ptr += raw_size;
    }
    buf
}

/// Point data directory `index` at `(rva, size)`.
pub fn set_data_directory(image: &mut [u8], index: usize, rva: u32, size: u32) {
    let at = PE_POINTER + 4 + 20 + 28 + 68 + index * 8;
    put_u32(image, at, rva);
    put_u32(image, at + 4, size);
}

/// Import directory for a section loaded at `rva`: descriptors, lookup and
/// address tables, then DLL names and hint/name entries. Returns the section
/// bytes and the descriptor table size.
fn import_section(rva: u32, imports: &[(&str, &[&str])]) -> (Vec<u8>, usize) {
    let descriptors = (imports.len() + 1) * 20;
    let thunks: usize = imports.iter().map(|(_, f)| (f.len() + 1) * 4).sum();
    let mut buf = vec![0u8; descriptors + 2 * thunks];
    let mut lookup = descriptors;
    let mut address = descriptors + thunks;
    for (i, (dll, functions)) in imports.iter().enumerate() {
        let name_rva = rva + buf.len() as u32;
        buf.extend_from_slice(dll.as_bytes());
        buf.push(0);
        let d = i * 20;
        put_u32(&mut buf, d, rva + lookup as u32);
        put_u32(&mut buf, d + 12, name_rva);
        put_u32(&mut buf, d + 16, rva + address as u32);
        for f in functions.iter() {
            if buf.len() % 2 == 1 {
                buf.push(0);
            }
            let hint_rva = rva + buf.len() as u32;
            buf.extend_from_slice(&[0, 0]);
            buf.extend_from_slice(f.as_bytes());
            buf.push(0);
            put_u32(&mut buf, lookup, hint_rva);
            put_u32(&mut buf, address, hint_rva);
            lookup += 4;
            address += 4;
        }
        // null terminators are already zero
        lookup += 4;
        address += 4;
    }
    (buf, descriptors)
}

/// `build_pe` plus a trailing `.idata` section importing `imports` by name.
pub fn build_pe_with_imports(sections: &[Section<'_>], imports: &[(&str, &[&str])]) -> Vec<u8> {
    let rva = (0x1000 * (sections.len() + 1)) as u32;
    let (idata, descriptors) = import_section(rva, imports);
    let mut all = sections.to_vec();
    all.push(Section {
        name: ".idata",
        characteristics: DATA_CHARACTERISTICS,
        raw: &idata,
    });
    let mut image = build_pe(&all);
    set_data_directory(&mut image, IMPORT_DIRECTORY, rva, descriptors as u32);
    image
}

/// `.text` of one repeated byte (entropy 0) and `.data` covering every byte value (entropy 8).
pub fn two_section_pe() -> Vec<u8> {
    let text = vec![0x90u8; FILE_ALIGNMENT];
    let data: Vec<u8> = (0..FILE_ALIGNMENT).map(|i| (i % 256) as u8).collect();
    build_pe(&[
        Section {
            name: ".text",
            characteristics: TEXT_CHARACTERISTICS,
            raw: &text,
        },
        Section {
            name: ".data",
            characteristics: DATA_CHARACTERISTICS,
            raw: &data,
        },
    ])
}

pub fn schema(names: &[&str]) -> FeatureSchema {
    FeatureSchema::new(names.iter().map(|n| n.to_string()).collect()).unwrap()
}

pub fn classes(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

/// Reconstructs every value off by `offset`, so the MSE is `offset²`.
pub struct ShiftReconstructor(pub f32);

impl Reconstructor for ShiftReconstructor {
    fn reconstruct(&self, input: &[f32]) -> Result<Vec<f32>, ScoringError> {
        Ok(input.iter().map(|v| v + self.0).collect())
    }
}

pub struct FailingReconstructor;

impl Reconstructor for FailingReconstructor {
    fn reconstruct(&self, _input: &[f32]) -> Result<Vec<f32>, ScoringError> {
        Err(ScoringError::MissingOutput("reconstruction".into()))
    }
}

/// Always returns the same prediction.
pub struct FixedClassifier {
    pub label: PredictedLabel,
    pub probabilities: Vec<f32>,
}

impl FixedClassifier {
    pub fn index(i: i64, probabilities: &[f32]) -> Self {
        Self {
            label: PredictedLabel::Index(i),
            probabilities: probabilities.to_vec(),
        }
    }

    pub fn named(name: &str, probabilities: &[f32]) -> Self {
        Self {
            label: PredictedLabel::Name(name.to_string()),
            probabilities: probabilities.to_vec(),
        }
    }
}

impl ProbabilisticClassifier for FixedClassifier {
    fn predict(&self, _input: &[f32]) -> Result<RawPrediction, ScoringError> {
        Ok(RawPrediction {
            label: self.label.clone(),
            probabilities: self.probabilities.clone(),
        })
    }
}

pub struct FailingClassifier;

impl ProbabilisticClassifier for FailingClassifier {
    fn predict(&self, _input: &[f32]) -> Result<RawPrediction, ScoringError> {
        Err(ScoringError::EmptyDistribution)
    }
}

pub fn context(
    feature_names: &[&str],
    class_names: &[&str],
    threshold: f64,
    reconstructor: impl Reconstructor + 'static,
    classifier: impl ProbabilisticClassifier + 'static,
) -> Arc<ScanContext> {
    let schema = schema(feature_names);
    let artifacts = ModelArtifacts::new(
        schema.clone(),
        StandardScaler::identity(schema.len()),
        AnomalyModel::new(Box::new(reconstructor), threshold),
        ClassifierModel::new(Box::new(classifier), classes(class_names)),
    )
    .unwrap();
    Arc::new(ScanContext::new(
        artifacts,
        VerdictEngine::new(FusionConfig::default()),
        ExtractionConfig::default(),
    ))
}
