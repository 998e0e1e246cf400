//! Pure text edits shared by every [`Remote`](crate::remote::Remote)
//! implementation. Each function returns `None` when the content
//! already has the desired shape, so callers only write back real
//! changes.

/// An exact-match, in-place edit of a text file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Substitution {
    /// Replace every occurrence of `from` with `to`.
    Literal { from: String, to: String },
    /// Replace every whole line starting with `prefix` by `line`.
    Line { prefix: String, line: String },
}

impl Substitution {
    #[must_use]
    pub fn literal(from: &str, to: &str) -> Self {
        Self::Literal {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    #[must_use]
    pub fn line(prefix: &str, line: &str) -> Self {
        Self::Line {
            prefix: prefix.to_string(),
            line: line.to_string(),
        }
    }
}

/// Apply a substitution. Returns the edited content, or `None` if
/// nothing changed. Content outside the matched text is preserved
/// byte for byte, including line endings.
#[must_use]
pub fn substitute(content: &str, edit: &Substitution) -> Option<String> {
    match edit {
        Substitution::Literal { from, to } => {
            if from.is_empty() || !content.contains(from.as_str()) {
                return None;
            }
            let out = content.replace(from.as_str(), to);
            (out != content).then_some(out)
        }
        Substitution::Line { prefix, line } => {
            let mut changed = false;
            let mut out = String::with_capacity(content.len());
            for chunk in content.split_inclusive('\n') {
                let (body, ending) = split_ending(chunk);
                if body.starts_with(prefix.as_str()) && body != line.as_str() {
                    out.push_str(line);
                    changed = true;
                } else {
                    out.push_str(body);
                }
                out.push_str(ending);
            }
            changed.then_some(out)
        }
    }
}

/// Append `line` unless an identical line is already present.
#[must_use]
pub fn append_line(content: &str, line: &str) -> Option<String> {
    if contains_line(content, line) {
        return None;
    }
    let mut out = content.to_string();
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(line);
    out.push('\n');
    Some(out)
}

/// Whether `content` has a line exactly equal to `line`.
#[must_use]
pub fn contains_line(content: &str, line: &str) -> bool {
    content.lines().any(|l| l == line)
}

fn split_ending(chunk: &str) -> (&str, &str) {
    if let Some(body) = chunk.strip_suffix("\r\n") {
        (body, "\r\n")
    } else if let Some(body) = chunk.strip_suffix('\n') {
        (body, "\n")
    } else {
        (chunk, "")
    }
}
