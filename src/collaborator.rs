use crate::error::{DrillError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, warn};

const GENERATION_SYSTEM_PROMPT: &str = "你是一个幼儿教育专家，擅长为汉字生成简单的词语和短句，帮助幼儿认字。生成的内容要简单易懂，适合3-6岁幼儿学习。";

const RECOGNITION_SYSTEM_PROMPT: &str =
    "你是一个幼儿教育专家，擅长为汉字生成简单的词语和短句，识别认字的拍照结果";

const RECOGNITION_PROMPT: &str = "分析一下图片，里面是一张认字和对应结果表格。每行里面有单词和短句，下面一行代表了上面行每个字的识字结果。答对的画圈，答错的画叉。你要做的是识别里面字和对应的识别结果，然后按单词输出。答对的输出1，答错的输出0，识别不了的就输出-1。例如：
小(1)鸟(0)
跑(0)步(1)
大(1)笑(-1)

注意：圈和叉有些是小孩画的，不那么标准，你要注意识别。里面只有2种结果，不是圈就是叉。
输出内容严格按照上面示例来，不要乱加其他符号";

/// What a generation collaborator handed back
#[derive(Debug, Clone, PartialEq)]
pub enum Generation {
    Text(Vec<String>),
    NoContent,
}

impl Generation {
    /// One item per line; blank lines and repeats are dropped, first
    /// occurrence wins.
    pub fn from_raw(text: &str) -> Self {
        let mut seen = HashSet::new();
        let lines: Vec<String> = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .filter(|l| seen.insert(l.to_string()))
            .map(str::to_string)
            .collect();
        if lines.is_empty() {
            Generation::NoContent
        } else {
            Generation::Text(lines)
        }
    }
}

/// A request for practice material built around sampled characters
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub characters: Vec<char>,
    pub num_phrases: usize,
    pub num_sentences: usize,
}

impl GenerationRequest {
    pub fn system_prompt(&self) -> &'static str {
        GENERATION_SYSTEM_PROMPT
    }

    pub fn user_prompt(&self) -> String {
        let chars: Vec<String> = self.characters.iter().map(char::to_string).collect();
        format!(
            "请基于以下汉字 [{}] 生成{}个词语和{}个短句。每个词语或句子占一行，不要添加任何序号或标点符号。",
            chars.join("、"),
            self.num_phrases,
            self.num_sentences
        )
    }
}

/// Turns sampled characters into candidate practice lines
pub trait ContentGenerator {
    fn generate(&self, request: &GenerationRequest) -> Result<Generation>;
}

/// Reads graded marks off a photographed practice sheet
pub trait Recognizer {
    fn recognize(&self, image: &Path) -> Result<Vec<String>>;
}

/// Serves practice material prepared ahead of time, ignoring the request
#[derive(Debug, Clone)]
pub struct FileGenerator {
    path: PathBuf,
}

impl FileGenerator {
    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }
}

impl ContentGenerator for FileGenerator {
    fn generate(&self, _request: &GenerationRequest) -> Result<Generation> {
        let text = fs::read_to_string(&self.path)?;
        Ok(Generation::from_raw(&text))
    }
}

/// Treats each input as a text transcript already in `char(code)` notation
#[derive(Debug, Clone, Copy, Default)]
pub struct TranscriptRecognizer;

impl Recognizer for TranscriptRecognizer {
    fn recognize(&self, transcript: &Path) -> Result<Vec<String>> {
        let text = fs::read_to_string(transcript)?;
        Ok(text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }
}

/// A local program standing in for a remote service. Credentials and model
/// names go in `env`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CommandSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl CommandSpec {
    pub fn new<S: Into<String>>(program: S) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Run the program with `input` on stdin and return its stdout
    fn run(&self, extra_arg: Option<&Path>, input: &str) -> Result<String> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .envs(&self.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(arg) = extra_arg {
            cmd.arg(arg);
        }
        debug!(program = %self.program, "running collaborator command");

        let mut child = cmd.spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(input.as_bytes())?;
        }
        let output = child.wait_with_output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DrillError::Collaborator(format!(
                "`{}` exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }
        String::from_utf8(output.stdout)
            .map_err(|e| DrillError::Collaborator(format!("non UTF-8 output: {e}")))
    }
}

/// Generation through an external command: prompts on stdin, lines on stdout
#[derive(Debug, Clone)]
pub struct CommandGenerator {
    spec: CommandSpec,
}

impl CommandGenerator {
    pub fn new(spec: CommandSpec) -> Self {
        Self { spec }
    }
}

impl ContentGenerator for CommandGenerator {
    fn generate(&self, request: &GenerationRequest) -> Result<Generation> {
        let input = format!("{}\n\n{}\n", request.system_prompt(), request.user_prompt());
        let output = self.spec.run(None, &input)?;
        Ok(Generation::from_raw(&output))
    }
}

/// Recognition through an external command; the image path is the last argument
#[derive(Debug, Clone)]
pub struct CommandRecognizer {
    spec: CommandSpec,
}

impl CommandRecognizer {
    pub fn new(spec: CommandSpec) -> Self {
        Self { spec }
    }
}

impl Recognizer for CommandRecognizer {
    fn recognize(&self, image: &Path) -> Result<Vec<String>> {
        if !image.exists() {
            warn!(image = %image.display(), "image not found");
        }
        let input = format!("{RECOGNITION_SYSTEM_PROMPT}\n\n{RECOGNITION_PROMPT}\n");
        let output = self.spec.run(Some(image), &input)?;
        Ok(output
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }
}
