//! Function-call hints for formula editors
//!
//! A plain scan over the text: it tracks parenthesis depth and string
//! literals without building a syntax tree, so it works on formulas that
//! are still being typed.

/// The call the caret sits in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionHint {
    /// Function name as written, uppercased
    pub name: String,
    /// Zero-based index of the argument under the caret
    pub argument_index: usize,
}

/// Find the innermost function call enclosing `caret` (a char offset)
///
/// Returns `None` when the caret is outside any call, or inside a string
/// literal.
///
/// ```rust
/// use tabula_formula::hint::find_function_hint;
///
/// let hint = find_function_hint("=IF(A1>0,SUM(B1,", 16).unwrap();
/// assert_eq!(hint.name, "SUM");
/// assert_eq!(hint.argument_index, 1);
/// ```
pub fn find_function_hint(formula: &str, caret: usize) -> Option<FunctionHint> {
    // One frame per open parenthesis; grouping parentheses carry no name
    let mut frames: Vec<Option<FunctionHint>> = Vec::new();
    let mut word = String::new();
    let mut in_string = false;
    let mut in_sheet = false;

    for c in formula.chars().take(caret) {
        if in_string {
            if c == '"' {
                in_string = false;
            }
            continue;
        }
        if in_sheet {
            if c == '\'' {
                in_sheet = false;
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                word.clear();
            }
            '\'' => {
                in_sheet = true;
                word.clear();
            }
            '(' => {
                let frame = is_function_name(&word).then(|| FunctionHint {
                    name: word.to_uppercase(),
                    argument_index: 0,
                });
                frames.push(frame);
                word.clear();
            }
            ')' => {
                frames.pop();
                word.clear();
            }
            ',' => {
                if let Some(Some(frame)) = frames.last_mut() {
                    frame.argument_index += 1;
                }
                word.clear();
            }
            c if c.is_alphanumeric() || c == '_' || c == '.' => word.push(c),
            _ => word.clear(),
        }
    }

    if in_string {
        return None;
    }
    frames.into_iter().rev().flatten().next()
}

fn is_function_name(word: &str) -> bool {
    word.chars().next().is_some_and(|c| c.is_alphabetic() || c == '_')
}
