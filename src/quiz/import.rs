use tracing::warn;

use crate::quiz::model::Question;

/// Header row expected at the top of an import file
pub const CSV_HEADER: &str = "question,option_a,option_b,option_c,option_d,correct_answer,points";

/// Template offered to instructors for bulk upload
pub const CSV_TEMPLATE: &str = r#"question,option_a,option_b,option_c,option_d,correct_answer,points
"What is 2 + 2?","2","4","6","8",2,1
"What is the capital of France?","London","Berlin","Paris","Madrid",3,1
"Which is the largest planet?","Mars","Jupiter","Earth","Venus",2,1
"#;

/// Minimum columns in a data row: prompt, four options, correct answer
const MIN_COLUMNS: usize = 6;

/// A row that was skipped during import
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRow {
    /// 1-based line number in the source text
    pub line: usize,
    pub reason: String,
}

/// Outcome of a CSV import
#[derive(Debug, Default)]
pub struct CsvImport {
    pub questions: Vec<Question>,
    pub rejected: Vec<RejectedRow>,
}

/// Parse questions from CSV text.
///
/// The first line is the header. Malformed rows are reported in
/// `rejected` and skipped; they never abort the import. Imported questions
/// get placeholder IDs (`row-<line>`) that the bank replaces on insert.
pub fn parse_questions_csv(text: &str) -> CsvImport {
    let mut import = CsvImport::default();

    for (idx, line) in text.lines().enumerate().skip(1) {
        let line_no = idx + 1;
        if line.trim().is_empty() {
            continue;
        }

        match parse_row(line) {
            Ok(mut question) => {
                question.id = format!("row-{}", line_no);
                import.questions.push(question);
            }
            Err(reason) => {
                warn!("Skipping CSV line {}: {}", line_no, reason);
                import.rejected.push(RejectedRow { line: line_no, reason });
            }
        }
    }

    import
}

fn parse_row(line: &str) -> Result<Question, String> {
    let fields = split_fields(line);
    if fields.len() < MIN_COLUMNS {
        return Err(format!(
            "expected at least {} columns, got {}",
            MIN_COLUMNS,
            fields.len()
        ));
    }

    let prompt = fields[0].clone();
    if prompt.is_empty() {
        return Err("question text is empty".to_string());
    }

    let options: Vec<String> = fields[1..5].iter().filter(|o| !o.is_empty()).cloned().collect();
    if options.len() < 2 {
        return Err(format!("need at least 2 options, got {}", options.len()));
    }

    let correct: usize = fields[5]
        .parse()
        .map_err(|_| format!("correct_answer '{}' is not a number", fields[5]))?;
    if correct == 0 || correct > options.len() {
        return Err(format!(
            "correct_answer {} is out of range 1..={}",
            correct,
            options.len()
        ));
    }

    let points = fields
        .get(6)
        .and_then(|p| p.parse::<u32>().ok())
        .filter(|p| *p > 0)
        .unwrap_or(1);

    Ok(Question {
        id: String::new(),
        question: prompt,
        options,
        correct_answer: correct - 1,
        points,
        category: None,
    })
}

/// Split one CSV line, honoring double quotes and `""` escapes
fn split_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.trim_end_matches('\r').chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                fields.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    fields.push(current.trim().to_string());

    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_parses_cleanly() {
        let import = parse_questions_csv(CSV_TEMPLATE);
        assert!(import.rejected.is_empty());
        assert_eq!(import.questions.len(), 3);

        let first = &import.questions[0];
        assert_eq!(first.question, "What is 2 + 2?");
        assert_eq!(first.options, vec!["2", "4", "6", "8"]);
        assert_eq!(first.correct_answer, 1);
        assert_eq!(first.points, 1);

        let paris = &import.questions[1];
        assert_eq!(paris.options[paris.correct_answer], "Paris");
    }

    #[test]
    fn template_starts_with_header() {
        assert!(CSV_TEMPLATE.starts_with(CSV_HEADER));
    }

    #[test]
    fn quoted_commas_are_kept() {
        let csv = format!("{}\n\"Pick, carefully\",\"a, b\",c,,,1,2\n", CSV_HEADER);
        let import = parse_questions_csv(&csv);

        assert_eq!(import.questions.len(), 1);
        let q = &import.questions[0];
        assert_eq!(q.question, "Pick, carefully");
        assert_eq!(q.options, vec!["a, b", "c"]);
        assert_eq!(q.points, 2);
    }

    #[test]
    fn escaped_quotes() {
        let fields = split_fields(r#""Say ""hi""",x,y"#);
        assert_eq!(fields, vec![r#"Say "hi""#, "x", "y"]);
    }

    #[test]
    fn malformed_rows_are_skipped_not_fatal() {
        let csv = format!(
            "{}\nshort,row\n\"Good?\",yes,no,,,1,1\n\"No options\",only,,,,1,1\n\"Out of range\",a,b,,,3,1\n\"Zero\",a,b,,,0,1\n,a,b,,,1,1\n\"Bad number\",a,b,,,x,1\n",
            CSV_HEADER
        );
        let import = parse_questions_csv(&csv);

        assert_eq!(import.questions.len(), 1);
        assert_eq!(import.questions[0].question, "Good?");

        let lines: Vec<usize> = import.rejected.iter().map(|r| r.line).collect();
        assert_eq!(lines, vec![2, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn points_default_to_one() {
        let csv = format!("{}\nQ1,a,b,c,d,4\nQ2,a,b,c,d,1,zero\nQ3,a,b,c,d,1,0\n", CSV_HEADER);
        let import = parse_questions_csv(&csv);

        assert_eq!(import.questions.len(), 3);
        assert!(import.questions.iter().all(|q| q.points == 1));
        assert_eq!(import.questions[0].correct_answer, 3);
    }

    #[test]
    fn blank_lines_and_crlf_are_tolerated() {
        let csv = format!("{}\r\n\r\nQ1,a,b,,,2,1\r\n", CSV_HEADER);
        let import = parse_questions_csv(&csv);

        assert!(import.rejected.is_empty());
        assert_eq!(import.questions.len(), 1);
        assert_eq!(import.questions[0].points, 1);
        assert_eq!(import.questions[0].id, "row-3");
    }

    #[test]
    fn imported_questions_validate() {
        let import = parse_questions_csv(CSV_TEMPLATE);
        for q in &import.questions {
            assert!(q.validate().is_ok());
        }
    }
}
