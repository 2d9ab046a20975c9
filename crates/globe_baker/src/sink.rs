//! JSON-lines acre sink: one object per acre, angles in degrees.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use acre_globe::{Acre, AcreConsumer, BuildError, BuildResult, GeoPoint};

/// One output line.
#[derive(Debug, Serialize)]
struct AcreLine {
	pack_id: u32,
	id: u64,
	flavor: &'static str,
	/// `[latitude, longitude]`
	center: [f64; 2],
	points: Vec<[f64; 2]>,
	/// Pack ids across each side, aligned with `points`.
	neighbors: Vec<u32>,
	/// Fine vertex ids owned or shared by the acre.
	vertices: Option<u64>,
}

impl AcreLine {
	fn new(acre: &Acre) -> Self {
		let record = acre.record();
		Self {
			pack_id: record.pack_id,
			id: record.id.get(),
			flavor: record.flavor.as_str(),
			center: degrees(record.center),
			points: record.points.iter().copied().map(degrees).collect(),
			neighbors: record.neighbors,
			vertices: acre.topography().map(|t| t.vertex_count()),
		}
	}
}

fn degrees(p: GeoPoint) -> [f64; 2] {
	[p.latitude().to_degrees(), p.longitude().to_degrees()]
}

/// Writes acres as they finish. Lines arrive in completion order, not pack
/// order.
pub struct JsonLinesSink {
	path: PathBuf,
	writer: Mutex<BufWriter<File>>,
	written: AtomicU64,
}

impl JsonLinesSink {
	pub fn create(path: &Path) -> Result<Self> {
		if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
			std::fs::create_dir_all(dir)
				.with_context(|| format!("Failed to create output dir: {}", dir.display()))?;
		}
		let file = File::create(path)
			.with_context(|| format!("Failed to create output file: {}", path.display()))?;
		Ok(Self {
			path: path.to_path_buf(),
			writer: Mutex::new(BufWriter::new(file)),
			written: AtomicU64::new(0),
		})
	}

	pub fn written(&self) -> u64 {
		self.written.load(Ordering::Relaxed)
	}

	/// Flush buffered lines to disk.
	pub fn finish(&self) -> Result<u64> {
		self.writer
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.flush()
			.with_context(|| format!("Failed to write: {}", self.path.display()))?;
		Ok(self.written())
	}
}

impl AcreConsumer for JsonLinesSink {
	fn consume(&self, acre: &Acre) -> BuildResult<()> {
		let mut line = serde_json::to_vec(&AcreLine::new(acre)).map_err(|e| BuildError::Sink(e.to_string()))?;
		line.push(b'\n');
		self.writer
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.write_all(&line)
			.map_err(|e| BuildError::Sink(format!("{}: {e}", self.path.display())))?;
		self.written.fetch_add(1, Ordering::Relaxed);
		Ok(())
	}
}
