use flate2::Compression;
use flate2::write::GzEncoder;
use std::path::PathBuf;

/// Files of a small Linux release bundle, as (relative path, contents).
pub const BUNDLE_FILES: &[(&str, &[u8])] = &[
    ("mupen64plus-bundle-linux64-2.6.0/bin/mupen64plus", b"#!/bin/sh\necho mupen64plus\n"),
    ("mupen64plus-bundle-linux64-2.6.0/lib/libmupen64plus.so.2", b"\x7fELF fake"),
    ("mupen64plus-bundle-linux64-2.6.0/README", b"Mupen64Plus test bundle\n"),
];

/// Gzipped tarball of `files`, built in memory.
pub fn tar_gz(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (name, data) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o755);
        header.set_cksum();
        builder
            .append_data(&mut header, name, *data)
            .expect("Failed to append tar entry");
    }
    builder
        .into_inner()
        .expect("Failed to finish tar stream")
        .finish()
        .expect("Failed to finish gzip stream")
}

/// Sorted relative paths of `files`.
pub fn manifest(files: &[(&str, &[u8])]) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = files.iter().map(|(name, _)| PathBuf::from(name)).collect();
    paths.sort();
    paths
}
