use crate::error::Result;
use crate::gradebook::{Capability, Gradebook, PushOutcome};
use crate::model::{BiologicalSex, ResidenceType, SchoolClass};
use crate::roster::NewStudent;
use serde::Serialize;
use tracing::{info, warn};

/// `name,email,password,class,sex,residence,birthDate`
const MIN_COLUMNS: usize = 7;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub success: usize,
    pub errors: Vec<String>,
    /// Remote outcome per created student, failures only.
    pub push_failures: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ParsedRow {
    pub line: usize,
    pub student: NewStudent,
}

/// Parses a pasted roster. Short rows become line errors; unknown codes fall
/// back to `1A`, `M` and `URBAN`.
pub fn parse_roster_csv(text: &str) -> (Vec<ParsedRow>, Vec<String>) {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let skip_header = lines
        .first()
        .map(|l| l.to_lowercase().contains("nome"))
        .unwrap_or(false);

    let mut rows = Vec::new();
    let mut errors = Vec::new();
    for (i, raw) in lines.iter().enumerate() {
        if i == 0 && skip_header {
            continue;
        }
        let line = i + 1;
        let cols: Vec<&str> = raw.split(',').map(str::trim).collect();
        if cols.len() < MIN_COLUMNS {
            errors.push(format!("line {}: missing required columns", line));
            continue;
        }

        let school_class = SchoolClass::parse(cols[3]).unwrap_or_else(|| {
            warn!(line, value = cols[3], "unknown class code, using 1A");
            SchoolClass::First1A
        });
        let biological_sex = if cols[4].eq_ignore_ascii_case("F") {
            BiologicalSex::F
        } else {
            if !cols[4].eq_ignore_ascii_case("M") {
                warn!(line, value = cols[4], "unknown sex code, using M");
            }
            BiologicalSex::M
        };
        let residence_type = if cols[5].eq_ignore_ascii_case("RURAL") {
            ResidenceType::Rural
        } else {
            if !cols[5].eq_ignore_ascii_case("URBAN") {
                warn!(line, value = cols[5], "unknown residence code, using URBAN");
            }
            ResidenceType::Urban
        };

        rows.push(ParsedRow {
            line,
            student: NewStudent {
                name: cols[0].to_string(),
                email: cols[1].to_string(),
                password: cols[2].to_string(),
                school_class,
                birth_date: cols[6].to_string(),
                biological_sex,
                residence_type,
                is_monitor: false,
                avatar_url: None,
            },
        });
    }
    (rows, errors)
}

impl Gradebook {
    /// Creates students row by row; one failing row never aborts the rest.
    pub fn import_students(&self, csv: &str) -> Result<ImportReport> {
        self.require(Capability::Admin)?;
        let (rows, mut errors) = parse_roster_csv(csv);
        let mut success = 0usize;
        let mut push_failures = Vec::new();
        for row in rows {
            let email = row.student.email.clone();
            match self.create_student(row.student) {
                Ok(created) => {
                    success += 1;
                    if let PushOutcome::Failed { message } = created.push {
                        push_failures.push(format!("{}: {}", email, message));
                    }
                }
                Err(e) => errors.push(format!("line {}: failed for {}: {}", row.line, email, e)),
            }
        }
        info!(success, errors = errors.len(), "roster import finished");
        Ok(ImportReport {
            success,
            errors,
            push_failures,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_is_skipped_and_short_rows_reported() {
        let csv = "Nome,Email,Senha,Turma,Sexo,Residencia,Nascimento\n\
                   \n\
                   Ana Souza,ana@escola.br,123456,2B,f,rural,2009-04-02\n\
                   Bruno,bruno@escola.br,123456\n";
        let (rows, errors) = parse_roster_csv(csv);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].line, 2);
        let s = &rows[0].student;
        assert_eq!(s.school_class, SchoolClass::Second2B);
        assert_eq!(s.biological_sex, BiologicalSex::F);
        assert_eq!(s.residence_type, ResidenceType::Rural);
        assert_eq!(s.birth_date, "2009-04-02");
        assert_eq!(errors, ["line 3: missing required columns"]);
    }

    #[test]
    fn unknown_codes_fall_back() {
        let (rows, errors) = parse_roster_csv("Caio,caio@escola.br,x,4C,?,praia,2008-01-01");
        assert!(errors.is_empty());
        let s = &rows[0].student;
        assert_eq!(s.school_class, SchoolClass::First1A);
        assert_eq!(s.biological_sex, BiologicalSex::M);
        assert_eq!(s.residence_type, ResidenceType::Urban);
        assert_eq!(rows[0].line, 1);
    }

    #[test]
    fn failing_row_does_not_abort_the_import() {
        let book = Gradebook::for_tests(None);
        let csv = "nome,email,senha,turma,sexo,residencia,nascimento\n\
                   Ana,ana@escola.br,123,1A,F,URBAN,2009-01-01\n\
                   Ana de novo,ana@escola.br,123,1B,F,URBAN,2009-01-01\n\
                   Curta,curta@escola.br\n\
                   Bia,bia@escola.br,123,3A,F,RURAL,2008-02-02";
        let report = book.import_students(csv).unwrap();
        assert_eq!(report.success, 2);
        assert_eq!(report.errors.len(), 2);
        assert!(report.errors.contains(&"line 4: missing required columns".to_string()));
        assert!(report
            .errors
            .iter()
            .any(|e| e.starts_with("line 3: failed for ana@escola.br:")));
        assert_eq!(book.store().students().unwrap().len(), 2);
    }
}
