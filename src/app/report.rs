use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::info;
use npyz::WriterBuilder;

use calibration::CalibrationProfile;

use crate::app::segments::SegmentRun;
use crate::app::tuning::SweepResult;

/// Where finished results go.
pub trait ResultSink {
    fn segment(&mut self, run: &SegmentRun) -> Result<()>;
    fn profile(&mut self, profile: &CalibrationProfile) -> Result<()>;
    fn sweep(&mut self, result: &SweepResult) -> Result<()>;
}

pub struct DiskSink {
    tag: String,
    data_dir: PathBuf,
    results_dir: PathBuf,
    header_path: PathBuf,
}

impl DiskSink {
    /// Raw data goes under `root/data`, reduced results under `root/results`.
    pub fn new(root: &Path, tag: &str, header_path: Option<PathBuf>) -> Result<DiskSink> {
        let data_dir = root.join("data");
        let results_dir = root.join("results");
        for dir in [&data_dir, &results_dir] {
            fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
        }
        let header_path = header_path.unwrap_or_else(|| results_dir.join("calibration.h"));
        Ok(DiskSink {
            tag: tag.to_string(),
            data_dir,
            results_dir,
            header_path,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn create(path: &Path) -> Result<BufWriter<File>> {
        let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
        Ok(BufWriter::new(file))
    }
}

impl ResultSink for DiskSink {
    fn segment(&mut self, run: &SegmentRun) -> Result<()> {
        let stem = format!("{}_seg{:02}", self.tag, run.index);

        let tsv = self.data_dir.join(format!("{}.tsv", stem));
        let mut out = DiskSink::create(&tsv)?;
        for (t, v) in &run.rows {
            writeln!(out, "{:.6}\t{}", t, v)?;
        }
        out.flush()?;

        let npy = self.data_dir.join(format!("{}.npy", stem));
        let mut writer = npyz::WriteOptions::new()
            .default_dtype()
            .shape(&[run.rows.len() as u64])
            .writer(DiskSink::create(&npy)?)
            .begin_nd()
            .with_context(|| format!("failed to start {}", npy.display()))?;
        writer.extend(run.rows.iter().map(|&(_, v)| v))?;
        writer.finish()?;

        info!("saved {} and {}", tsv.display(), npy.display());
        Ok(())
    }

    fn profile(&mut self, profile: &CalibrationProfile) -> Result<()> {
        let json_path = self.results_dir.join(format!("{}_calibration_profile.json", self.tag));
        let mut out = DiskSink::create(&json_path)?;
        serde_json::to_writer_pretty(&mut out, profile)?;
        out.flush()?;
        info!("saved {}", json_path.display());

        let banner = format!("Auto-generated by fader-tuning (segmented calibration) {}", self.tag);
        if let Some(parent) = self.header_path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(&self.header_path, profile.to_c_header(&banner))
            .with_context(|| format!("failed to write {}", self.header_path.display()))?;
        info!("wrote {}", self.header_path.display());
        Ok(())
    }

    fn sweep(&mut self, result: &SweepResult) -> Result<()> {
        let path = self.results_dir.join(format!("{}_{}_avg.tsv", self.tag, result.gains.name()));
        let mut out = DiskSink::create(&path)?;
        for (r, p) in result.reference.iter().zip(&result.position) {
            writeln!(out, "{}\t{}", r, p)?;
        }
        out.flush()?;
        info!("saved {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
#[derive(Default)]
pub struct MemorySink {
    pub segments: Vec<SegmentRun>,
    pub profiles: Vec<CalibrationProfile>,
    pub sweeps: Vec<SweepResult>,
}

#[cfg(test)]
impl ResultSink for MemorySink {
    fn segment(&mut self, run: &SegmentRun) -> Result<()> {
        self.segments.push(run.clone());
        Ok(())
    }

    fn profile(&mut self, profile: &CalibrationProfile) -> Result<()> {
        self.profiles.push(profile.clone());
        Ok(())
    }

    fn sweep(&mut self, result: &SweepResult) -> Result<()> {
        self.sweeps.push(result.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calibration::{Estimator, ProfileBuilder, SegmentEstimate};
    use config::GainSet;

    fn test_root(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("fader-tuning-report-{}-{}", name, std::process::id()))
    }

    #[test]
    fn test_disk_sink_profile() {
        let root = test_root("profile");
        let mut sink = DiskSink::new(&root, "t0", None).unwrap();

        let mut builder = ProfileBuilder::new(2, Estimator::default()).unwrap();
        builder.update(&[10; 12]);
        builder.update(&[3000; 12]);
        let profile = builder.build().unwrap();
        sink.profile(&profile).unwrap();

        let json = fs::read_to_string(root.join("results/t0_calibration_profile.json")).unwrap();
        let back: CalibrationProfile = serde_json::from_str(&json).unwrap();
        assert_eq!(back, profile);

        let header = fs::read_to_string(root.join("results/calibration.h")).unwrap();
        assert!(header.contains("FADER_CENTER_LUT[FADER_SEGMENTS] = {10,3000};"));
    }

    #[test]
    fn test_header_directory_created() {
        let root = test_root("header-dir");
        let header = root.join("firmware/include/fader_cal.h");
        let mut sink = DiskSink::new(&root, "t3", Some(header.clone())).unwrap();

        let mut builder = ProfileBuilder::new(1, Estimator::default()).unwrap();
        builder.update(&[2000; 12]);
        sink.profile(&builder.build().unwrap()).unwrap();

        let text = fs::read_to_string(&header).unwrap();
        assert!(text.contains("constexpr int FADER_SEGMENTS = 1;"));
    }

    #[test]
    fn test_disk_sink_segment() {
        let root = test_root("segment");
        let mut sink = DiskSink::new(&root, "t1", None).unwrap();

        let run = SegmentRun {
            index: 3,
            bounds: (768, 1024),
            rows: vec![(0.0, 900), (0.02, 901)],
            estimate: SegmentEstimate { center: 900, deadzone: 2 },
        };
        sink.segment(&run).unwrap();

        let tsv = fs::read_to_string(root.join("data/t1_seg03.tsv")).unwrap();
        assert_eq!(tsv, "0.000000\t900\n0.020000\t901\n");

        let bytes = fs::read(root.join("data/t1_seg03.npy")).unwrap();
        let npy = npyz::NpyFile::new(&bytes[..]).unwrap();
        assert_eq!(npy.shape(), &[2]);
        assert_eq!(npy.into_vec::<u16>().unwrap(), vec![900, 901]);
    }

    #[test]
    fn test_disk_sink_sweep() {
        let root = test_root("sweep");
        let mut sink = DiskSink::new(&root, "t2", None).unwrap();
        let gains = GainSet::new(6.0, 2.0, 0.035, 0.001, 60.0);
        sink.sweep(&SweepResult {
            gains,
            reference: vec![0.0, 10.0],
            position: vec![0.0, 9.5],
            rmse: vec![0.25],
        }).unwrap();

        let text = fs::read_to_string(root.join(format!("results/t2_{}_avg.tsv", gains.name()))).unwrap();
        assert_eq!(text, "0\t0\n10\t9.5\n");
    }
}
