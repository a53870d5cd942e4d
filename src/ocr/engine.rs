use anyhow::{Context, anyhow};
use image::GrayImage;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use super::{Recognition, TextRecognizer, Word};
use crate::config::ScannerConfig;
use crate::error::{FormError, Result};
use crate::prepare::PixelRect;

#[cfg(windows)]
const TESSERACT_EXE: &str = "tesseract.exe";
#[cfg(not(windows))]
const TESSERACT_EXE: &str = "tesseract";

/// Runs the `tesseract` command-line tool on each region.
#[derive(Clone, Debug)]
pub struct TesseractRecognizer {
    executable: PathBuf,
    tessdata_dir: Option<PathBuf>,
    language: String,
}

impl TesseractRecognizer {
    pub fn new(executable: PathBuf, tessdata_dir: Option<PathBuf>) -> Self {
        Self {
            executable,
            tessdata_dir,
            language: "eng".to_string(),
        }
    }

    /// Finds tesseract and its language data from the configuration, the
    /// local `tesseract/` directory, or the system.
    pub fn locate(config: &ScannerConfig) -> anyhow::Result<Self> {
        let executable = find_tesseract_executable(config.tesseract_path.as_deref())?;
        let tessdata_dir = find_tessdata_dir(config.tessdata_dir.as_deref());
        info!(
            executable = %executable.display(),
            tessdata = ?tessdata_dir,
            "Tesseract located"
        );
        Ok(Self::new(executable, tessdata_dir))
    }

    fn run(&self, img: &GrayImage, psm: u8) -> anyhow::Result<Recognition> {
        // Save image to temporary file
        let temp_input = NamedTempFile::with_suffix(".png")?;
        img.save(temp_input.path())
            .context("Failed to write OCR input image")?;

        // Tesseract appends .tsv to the output base
        let temp_output = NamedTempFile::new()?;
        let output_base = temp_output.path().to_string_lossy().to_string();

        let mut command = Command::new(&self.executable);
        command.arg(temp_input.path()).arg(&output_base);
        if let Some(dir) = &self.tessdata_dir {
            command.arg("--tessdata-dir").arg(dir);
        }
        let output = command
            .arg("-l")
            .arg(&self.language)
            .arg("--oem")
            .arg("3")
            .arg("--psm")
            .arg(psm.to_string())
            .arg("tsv")
            .output()
            .with_context(|| format!("Failed to run {}", self.executable.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("Tesseract failed: {}", stderr.trim()));
        }

        let tsv_path = format!("{}.tsv", output_base);
        let tsv_content = std::fs::read_to_string(&tsv_path)
            .map_err(|e| anyhow!("Failed to read Tesseract output: {}", e))?;
        let _ = std::fs::remove_file(&tsv_path);

        Ok(parse_tsv_output(&tsv_content))
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn recognize(&self, region: &GrayImage, psm: u8) -> Result<Recognition> {
        if region.width() == 0 || region.height() == 0 {
            return Ok(Recognition::default());
        }

        let recognition = self
            .run(region, psm)
            .map_err(|e| FormError::Ocr(format!("{:#}", e)))?;
        debug!(psm, text = %recognition.text, confidence = recognition.confidence, "Region recognized");
        Ok(recognition)
    }
}

/// Parses Tesseract TSV output. Words are joined with single spaces and the
/// confidence is the mean over words with non-empty text and conf >= 0.
/// Each kept word also carries its box in region pixels.
pub fn parse_tsv_output(tsv: &str) -> Recognition {
    let mut words: Vec<Word> = Vec::new();
    let mut conf_sum = 0.0f32;

    // Skip header
    for line in tsv.lines().skip(1) {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 12 {
            continue;
        }

        // TSV fields: level, page_num, block_num, par_num, line_num, word_num,
        //             left, top, width, height, conf, text
        let level: i32 = fields[0].parse().unwrap_or(-1);
        let conf: f32 = fields[10].trim().parse().unwrap_or(-1.0);
        let text = fields[11].trim();

        // Level 5 = word
        if level != 5 || text.is_empty() || conf < 0.0 {
            continue;
        }

        let coord = |i: usize| fields[i].trim().parse::<u32>().unwrap_or(0);
        words.push(Word {
            text: text.to_string(),
            confidence: conf,
            bounds: PixelRect {
                x: coord(6),
                y: coord(7),
                width: coord(8),
                height: coord(9),
            },
        });
        conf_sum += conf;
    }

    let confidence = if words.is_empty() {
        0.0
    } else {
        conf_sum / words.len() as f32
    };

    let text = words.iter().map(|w| w.text.as_str()).collect::<Vec<_>>().join(" ");
    Recognition {
        text,
        confidence,
        words,
    }
}

/// Finds the tesseract executable.
///
/// Order: configured path, `<exe_dir>/tesseract/`, the user's local data
/// directory, then `tesseract` on PATH.
pub fn find_tesseract_executable(configured: Option<&Path>) -> anyhow::Result<PathBuf> {
    if let Some(path) = configured {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return Err(anyhow!("Configured tesseract not found at {}", path.display()));
    }

    let local_exe = crate::paths::get_tesseract_dir().join(TESSERACT_EXE);
    if local_exe.exists() {
        return Ok(local_exe);
    }

    if let Some(data_dir) = dirs::data_local_dir() {
        let user_exe = data_dir.join("form-scanner").join("tesseract").join(TESSERACT_EXE);
        if user_exe.exists() {
            return Ok(user_exe);
        }
    }

    // Check PATH
    if let Ok(output) = Command::new("tesseract").arg("--version").output() {
        if output.status.success() {
            return Ok(PathBuf::from("tesseract"));
        }
    }

    Err(anyhow!(
        "Tesseract not found. Install it or set \"tesseract_path\" in config.json"
    ))
}

/// Finds a tessdata directory containing `eng.traineddata`. `None` lets
/// tesseract use its built-in default.
pub fn find_tessdata_dir(configured: Option<&Path>) -> Option<PathBuf> {
    let has_eng = |dir: &Path| dir.join("eng.traineddata").exists();

    if let Some(dir) = configured {
        return Some(dir.to_path_buf());
    }

    let local_tessdata = crate::paths::get_tesseract_dir().join("tessdata");
    if has_eng(&local_tessdata) {
        return Some(local_tessdata);
    }

    // TESSDATA_PREFIX may point at the tessdata dir or its parent
    if let Ok(prefix) = std::env::var("TESSDATA_PREFIX") {
        let p = PathBuf::from(&prefix);
        if has_eng(&p) {
            return Some(p);
        }
        let p = p.join("tessdata");
        if has_eng(&p) {
            return Some(p);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const HEADER: &str =
        "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext";

    #[test]
    fn test_parse_tsv_averages_word_confidence() {
        let tsv = format!(
            "{HEADER}\n\
             1\t1\t0\t0\t0\t0\t0\t0\t200\t40\t-1\t\n\
             4\t1\t1\t1\t1\t0\t5\t5\t190\t30\t-1\t\n\
             5\t1\t1\t1\t1\t1\t5\t5\t80\t30\t90.5\t24H12345\n\
             5\t1\t1\t1\t1\t2\t90\t5\t60\t30\t70.5\tSmith\n\
             5\t1\t1\t1\t1\t3\t150\t5\t10\t30\t95\t \n"
        );

        let result = parse_tsv_output(&tsv);

        assert_eq!(result.text, "24H12345 Smith");
        assert!((result.confidence - 80.5).abs() < 1e-4);
        assert_eq!(result.words.len(), 2);
        assert_eq!(result.words[1].text, "Smith");
        assert_eq!(result.words[1].confidence, 70.5);
        assert_eq!(
            result.words[1].bounds,
            PixelRect { x: 90, y: 5, width: 60, height: 30 }
        );
    }

    #[test]
    fn test_parse_tsv_skips_negative_confidence() {
        let tsv = format!("{HEADER}\n5\t1\t1\t1\t1\t1\t0\t0\t10\t10\t-1\tghost\n");
        let result = parse_tsv_output(&tsv);
        assert_eq!(result, Recognition::default());
    }

    #[test]
    fn test_parse_tsv_empty_output() {
        let result = parse_tsv_output(HEADER);
        assert_eq!(result.text, "");
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn test_configured_executable_must_exist() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope").join(TESSERACT_EXE);
        assert!(find_tesseract_executable(Some(&missing)).is_err());

        let present = dir.path().join(TESSERACT_EXE);
        std::fs::write(&present, b"").unwrap();
        assert_eq!(find_tesseract_executable(Some(&present)).unwrap(), present);
    }

    #[test]
    fn test_configured_tessdata_wins() {
        let dir = tempdir().unwrap();
        assert_eq!(find_tessdata_dir(Some(dir.path())), Some(dir.path().to_path_buf()));
    }

    #[test]
    fn test_empty_region_skips_tesseract() {
        let recognizer = TesseractRecognizer::new(PathBuf::from("/nonexistent/tesseract"), None);
        let result = recognizer.recognize(&GrayImage::new(0, 5), 6).unwrap();
        assert_eq!(result, Recognition::default());
    }

    #[test]
    fn test_missing_binary_is_ocr_error() {
        let recognizer = TesseractRecognizer::new(PathBuf::from("/nonexistent/tesseract"), None);
        let err = recognizer.recognize(&GrayImage::new(4, 4), 6).unwrap_err();
        assert!(matches!(err, FormError::Ocr(_)));
    }
}
