//! # provus_formatter
//!
//! provus_formatter prepares time-domain electromagnetic survey data for import into
//! Provus. It reads the fixed-format headers of TEM and PEM data files, derives the
//! transmitter waveform and channel sampling scheme each file was acquired with, writes
//! those definitions as the CSV files Provus expects, and keeps the data file headers
//! and the Provus project file consistent with the chosen assignments.
//!
//! ## Installation
//!
//! The only method of install is from source.
//!
//! ### Rust
//!
//! If you have not used Rust before, you will most likely need to install the Rust tool
//! chain. See the [Rust docs](https://www.rust-lang.org/tools/install) for installation
//! instructions.
//!
//! ### Building & Install
//!
//! To build and install the CLI use `cargo install --path ./provus_formatter_cli` from the
//! top level repository. The binary will be installed to your cargo install location
//! (typically something like `~/.cargo/bin/`). To use the CLI see the
//! `provus_formatter_cli` README.
//!
//! ## Configuration
//!
//! The CLI is driven by a YAML configuration file:
//!
//! ```yml
//! root_path: None
//! data_files: []
//! recursive: false
//! n_threads: 1
//! project_name: Default
//! mcg_files: []
//! assignments:
//! - file: None
//!   waveform: null
//!   sampling: null
//!   data_style: null
//! ```
//!
//! - `root_path`: the survey directory. `Provus_Options` and the project file live here.
//! - `data_files`: data files relative to the root. If empty, the root is scanned for
//! `.tem` and `.pem` files (including subdirectories if `recursive` is set).
//! - `n_threads`: number of workers used to read data file headers. Must be at least 1.
//! - `project_name`: written to a newly created project file.
//! - `mcg_files`: Maxwell `.mcg` configurations to import as extra waveforms and schemes.
//! - `assignments`: per-file overrides of the detected waveform, sampling scheme and data
//! style. Names must exist in the catalog (presets, `Provus_Options`, or MCG imports).
//!
//! ## Output
//!
//! ```text
//! root
//! |---- project.ppf (or the first existing *.ppf)
//! |---- Provus_Options
//! |    |---- Waveforms
//! |    |    |---- <waveform name>.csv
//! |    |---- Channel_Sampling_Schemes
//! |    |    |---- <scheme name>.csv
//! ```
//!
//! TEM data files get `WAVEFORM:`, `SAMPLING:` and `DATASTYLE:` fields on their base
//! frequency header line. No other byte of a data file is changed.
pub mod assignment;
pub mod atomic_file;
pub mod catalog;
pub mod config;
pub mod constants;
pub mod error;
pub mod exporter;
pub mod extractor;
pub mod header;
pub mod header_writer;
pub mod manifest;
pub mod mcg;
pub mod presets;
pub mod process;
pub mod report;
pub mod sampling;
pub mod session;
pub mod waveform;
pub mod worker_status;
