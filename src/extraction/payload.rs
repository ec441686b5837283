use serde::{Deserialize, Serialize};

use crate::document::{CellAddress, Workbook};
use crate::language_utils::Direction;
use crate::translation::walker::CellWalker;

/// A cell selected for out-of-process translation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedCell {
    pub address: CellAddress,
    /// Trimmed cell text
    pub text: String,
}

impl ExtractedCell {
    /// `<Sheet1!A1, 원본텍스트>`, with the sheet quoted when it needs to be
    pub fn token(&self) -> String {
        format!("<{}, {}>", self.address.quoted(), self.text)
    }
}

/// Address-tagged cell list plus the instruction sent along with it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionPayload {
    /// Archive token the reply must be reconciled against
    pub token: String,
    pub direction: Direction,
    pub cells: Vec<ExtractedCell>,
    /// Instruction text with the cell list embedded
    pub prompt: String,
}

impl ExtractionPayload {
    /// Collect every non-excluded cell holding source-script text, in sheet
    /// then row-major order
    pub fn collect(workbook: &Workbook, walker: &CellWalker, direction: Direction) -> Vec<ExtractedCell> {
        let mut cells = Vec::new();
        walker.for_each_translatable_cell(workbook, |address, text| {
            let text = text.trim();
            if direction.has_source_script(text) {
                cells.push(ExtractedCell {
                    address: address.clone(),
                    text: text.to_string(),
                });
            }
        });
        cells
    }

    pub fn new(token: impl Into<String>, direction: Direction, cells: Vec<ExtractedCell>) -> Self {
        let prompt = build_instruction(direction, &cells);
        Self {
            token: token.into(),
            direction,
            cells,
            prompt,
        }
    }

    /// The bare token lines, one per cell
    pub fn lines(&self) -> Vec<String> {
        self.cells.iter().map(ExtractedCell::token).collect()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

fn language_label(code: &str) -> &'static str {
    match code {
        "ko" => "한국어",
        _ => "중국어",
    }
}

/// Instruction describing the reply grammar, with the cell list embedded
pub fn build_instruction(direction: Direction, cells: &[ExtractedCell]) -> String {
    let source = language_label(direction.source_code());
    let target = language_label(direction.target_code());
    let list: Vec<String> = cells.iter().map(ExtractedCell::token).collect();
    let (example_a, example_b) = match direction {
        Direction::KoToZh => (
            "<Sheet1!A1, 안녕하세요> -> 你好",
            "<Sheet1!B2, 프로젝트 관리> -> 项目管理",
        ),
        Direction::ZhToKo => (
            "<Sheet1!A1, 你好> -> 안녕하세요",
            "<Sheet1!B2, 项目管理> -> 프로젝트 관리",
        ),
    };

    format!(
        "다음은 엑셀 파일에서 추출한 {source} 텍스트들입니다. 각 텍스트를 {target}로 번역해주세요. 영어는 그대로 유지해주세요.\n\n\
         번역할 텍스트 목록:\n{list}\n\n\
         답변 형식:\n각 줄마다 다음 형식으로 답변해주세요:\n<셀주소, 원본텍스트> -> 번역된텍스트\n\n\
         예시:\n{example_a}\n{example_b}",
        list = list.join("\n"),
    )
}
