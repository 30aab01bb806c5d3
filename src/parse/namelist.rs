//! Fortran namelist documents: preset and output files of the optimizer.
//!
//! A [`NamelistDocument`] keeps every group and assignment of its input as
//! written, so a preset can be carried over into an output file with only
//! single keys replaced. Only the `&operating_conditions` group is
//! interpreted. Both the indexed form (`op_point(3) = 0.25`) and value lists
//! (`op_point = 0.1, 0.25`) are accepted; `!` starts a comment and `/` (or
//! `&end`) closes a group.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use crate::oppoints::{OpMode, OpPointError, OperatingPoint, OperatingPointSet, OptimizationGoal};

const GROUP: &str = "operating_conditions";

/// Upper bound for `noppoint` and the indices of op point entries.
pub const MAX_OP_POINTS: usize = 1000;

/// Keys of `&operating_conditions` that describe the op points.
const POINT_KEYS: [&str; 8] = [
    "noppoint",
    "name",
    "op_mode",
    "op_point",
    "optimization_type",
    "target_value",
    "weighting",
    "reynolds",
];

/// Result type for namelist handling.
pub type NamelistResult<T> = Result<T, NamelistError>;

/// Errors raised while reading a namelist document.
#[derive(Debug, Error)]
pub enum NamelistError {
    #[error("namelist group `&{0}` not found")]
    MissingGroup(String),
    #[error("namelist group `&{0}` is not terminated")]
    Unterminated(String),
    #[error("unterminated string in namelist")]
    UnterminatedString,
    #[error("value `{value}` without a key")]
    DanglingValue { value: String },
    #[error("invalid index in `{key}`")]
    InvalidIndex { key: String },
    #[error("`{key}({index})` must be a {expected}")]
    InvalidValue {
        key: String,
        index: usize,
        expected: &'static str,
    },
    #[error("`{key}` asks for {count} op points, at most {} are supported", MAX_OP_POINTS)]
    TooManyPoints { key: String, count: usize },
    #[error(transparent)]
    OpPoint(#[from] OpPointError),
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Word(String),
    Quoted(String),
    Assign,
}

#[derive(Debug, Clone, PartialEq)]
struct Token {
    kind: TokenKind,
    /// Byte offset of the token in the tokenized text.
    start: usize,
}

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Number(f64),
    Bool(bool),
    Text(String),
}

impl Value {
    fn from_token(kind: TokenKind) -> Option<Self> {
        match kind {
            TokenKind::Quoted(text) => Some(Self::Text(text)),
            TokenKind::Word(word) => Some(Self::from_word(word)),
            TokenKind::Assign => None,
        }
    }

    fn from_word(word: String) -> Self {
        match word.to_ascii_lowercase().as_str() {
            ".true." | "t" | ".t." => return Self::Bool(true),
            ".false." | "f" | ".f." => return Self::Bool(false),
            _ => {}
        }
        match word.replace(['d', 'D'], "e").parse::<f64>() {
            Ok(number) => Self::Number(number),
            Err(_) => Self::Text(word),
        }
    }
}

/// Length of a group body and of its terminator, or `None` when the body
/// never ends.
fn group_end(body: &str) -> Option<(usize, usize)> {
    let mut in_quote: Option<char> = None;
    let mut in_comment = false;
    for (offset, c) in body.char_indices() {
        match (in_quote, c) {
            (Some(quote), _) if c == quote => in_quote = None,
            (Some(_), _) => {}
            _ if in_comment => in_comment = c != '\n',
            (None, '!') => in_comment = true,
            (None, '\'' | '"') => in_quote = Some(c),
            (None, '/') => return Some((offset, 1)),
            (None, '&')
                if body
                    .get(offset..offset + 4)
                    .is_some_and(|end| end.eq_ignore_ascii_case("&end")) =>
            {
                return Some((offset, 4));
            }
            _ => {}
        }
    }
    None
}

/// Offset of the next `&` opening a group, skipping comment lines.
fn next_group_start(input: &str, from: usize) -> Option<usize> {
    let mut in_comment = false;
    for (offset, c) in input[from..].char_indices() {
        match c {
            '\n' => in_comment = false,
            '!' => in_comment = true,
            '&' if !in_comment => return Some(from + offset),
            _ => {}
        }
    }
    None
}

fn tokenize(body: &str) -> NamelistResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut word: Option<(usize, String)> = None;
    let mut chars = body.char_indices();

    let flush = |word: &mut Option<(usize, String)>, tokens: &mut Vec<Token>| {
        if let Some((start, text)) = word.take() {
            tokens.push(Token {
                kind: TokenKind::Word(text),
                start,
            });
        }
    };

    while let Some((pos, c)) = chars.next() {
        match c {
            '\'' | '"' => {
                flush(&mut word, &mut tokens);
                let mut text = String::new();
                loop {
                    match chars.next() {
                        Some((_, next)) if next == c => break,
                        Some((_, next)) => text.push(next),
                        None => return Err(NamelistError::UnterminatedString),
                    }
                }
                tokens.push(Token {
                    kind: TokenKind::Quoted(text),
                    start: pos,
                });
            }
            '!' => {
                flush(&mut word, &mut tokens);
                for (_, next) in chars.by_ref() {
                    if next == '\n' {
                        break;
                    }
                }
            }
            '=' => {
                flush(&mut word, &mut tokens);
                tokens.push(Token {
                    kind: TokenKind::Assign,
                    start: pos,
                });
            }
            ',' => flush(&mut word, &mut tokens),
            c if c.is_whitespace() => flush(&mut word, &mut tokens),
            c => word.get_or_insert_with(|| (pos, String::new())).1.push(c),
        }
    }
    flush(&mut word, &mut tokens);
    Ok(tokens)
}

/// `op_point(3)` → `op_point`.
fn base_key(key: &str) -> String {
    key.split_once('(')
        .map_or(key, |(name, _)| name)
        .trim()
        .to_ascii_lowercase()
}

/// `op_point(3)` → (`op_point`, 2); `noppoint` → (`noppoint`, 0).
fn split_key(key: &str) -> NamelistResult<(String, usize)> {
    let Some((name, rest)) = key.split_once('(') else {
        return Ok((key.to_ascii_lowercase(), 0));
    };
    let index = rest
        .strip_suffix(')')
        .and_then(|index| index.trim().parse::<usize>().ok())
        .filter(|index| *index >= 1)
        .ok_or_else(|| NamelistError::InvalidIndex {
            key: key.to_owned(),
        })?;
    Ok((name.to_ascii_lowercase(), index - 1))
}

type Assignments = BTreeMap<String, Vec<Option<Value>>>;

fn collect_assignments(tokens: Vec<Token>) -> NamelistResult<Assignments> {
    let mut assignments = Assignments::new();
    let mut current: Option<(String, usize)> = None;
    let mut tokens = tokens.into_iter().peekable();

    while let Some(token) = tokens.next() {
        if let TokenKind::Word(word) = &token.kind {
            if tokens.peek().is_some_and(|next| next.kind == TokenKind::Assign) {
                tokens.next();
                current = Some(split_key(word)?);
                continue;
            }
        }

        let Some((key, index)) = current.as_mut() else {
            return Err(NamelistError::DanglingValue {
                value: format!("{:?}", token.kind),
            });
        };
        let Some(value) = Value::from_token(token.kind) else {
            continue;
        };
        if *index >= MAX_OP_POINTS {
            return Err(NamelistError::TooManyPoints {
                key: key.clone(),
                count: *index + 1,
            });
        }
        let values = assignments.entry(key.clone()).or_default();
        if values.len() <= *index {
            values.resize(*index + 1, None);
        }
        values[*index] = Some(value);
        *index += 1;
    }
    Ok(assignments)
}

fn number_at(assignments: &Assignments, key: &str, index: usize) -> NamelistResult<Option<f64>> {
    match assignments.get(key).and_then(|values| values.get(index)).cloned().flatten() {
        None => Ok(None),
        Some(Value::Number(number)) => Ok(Some(number)),
        Some(_) => Err(NamelistError::InvalidValue {
            key: key.to_owned(),
            index: index + 1,
            expected: "number",
        }),
    }
}

fn text_at(assignments: &Assignments, key: &str, index: usize) -> Option<String> {
    match assignments.get(key).and_then(|values| values.get(index)).cloned().flatten() {
        Some(Value::Text(text)) => Some(text),
        Some(Value::Number(number)) => Some(number.to_string()),
        Some(Value::Bool(flag)) => Some(flag.to_string()),
        None => None,
    }
}

/// One `key = values` assignment, kept as written.
#[derive(Debug, Clone, PartialEq)]
struct Entry {
    key: String,
    text: String,
}

/// A namelist group with its assignments in input order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NamelistGroup {
    name: String,
    entries: Vec<Entry>,
}

impl NamelistGroup {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_ascii_lowercase(),
            entries: Vec::new(),
        }
    }

    fn from_body(name: &str, body: &str) -> NamelistResult<Self> {
        let tokens = tokenize(body)?;
        let starts: Vec<usize> = tokens
            .windows(2)
            .filter(|pair| matches!(pair[0].kind, TokenKind::Word(_)) && pair[1].kind == TokenKind::Assign)
            .map(|pair| pair[0].start)
            .collect();

        if let Some(first) = tokens.first() {
            if starts.first() != Some(&first.start) {
                return Err(NamelistError::DanglingValue {
                    value: format!("{:?}", first.kind),
                });
            }
        }

        let mut group = Self::new(name);
        for (idx, &start) in starts.iter().enumerate() {
            let end = starts.get(idx + 1).copied().unwrap_or(body.len());
            let text = body[start..end].trim_end();
            let key = text.split_once('=').map_or(text, |(key, _)| key);
            group.entries.push(Entry {
                key: base_key(key),
                text: text.to_owned(),
            });
        }
        Ok(group)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Keys of all assignments, without indices.
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|entry| entry.key.as_str())
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        let key = key.to_ascii_lowercase();
        self.entries.iter().any(|entry| entry.key == key)
    }

    /// Replaces every assignment of `key` by `key = value`, at the place of
    /// the first one, or appends it.
    pub fn set(&mut self, key: &str, value: &str) {
        let base = base_key(key);
        let entry = Entry {
            key: base.clone(),
            text: format!("{key} = {value}"),
        };
        match self.entries.iter().position(|existing| existing.key == base) {
            Some(position) => {
                self.entries[position] = entry;
                let mut idx = 0;
                self.entries.retain(|existing| {
                    let keep = idx == position || existing.key != base;
                    idx += 1;
                    keep
                });
            }
            None => self.entries.push(entry),
        }
    }

    /// Drops all assignments of the given keys.
    pub fn remove(&mut self, keys: &[&str]) {
        self.entries
            .retain(|entry| !keys.iter().any(|key| entry.key.eq_ignore_ascii_case(key)));
    }

    fn push(&mut self, key: String, value: String) {
        self.entries.push(Entry {
            key: base_key(&key),
            text: format!("{key} = {value}"),
        });
    }

    fn assignments(&self) -> NamelistResult<Assignments> {
        let text: Vec<&str> = self.entries.iter().map(|entry| entry.text.as_str()).collect();
        collect_assignments(tokenize(&text.join("\n"))?)
    }

    fn push_points(&mut self, set: &OperatingPointSet) {
        let points = set.points();
        self.push("noppoint".to_owned(), points.len().to_string());
        for (idx, point) in points.iter().enumerate() {
            self.push(format!("op_mode({})", idx + 1), format!("'{}'", point.mode));
        }
        for (idx, point) in points.iter().enumerate() {
            self.push(format!("op_point({})", idx + 1), real(point.value));
        }
        for (idx, point) in points.iter().enumerate() {
            self.push(format!("optimization_type({})", idx + 1), format!("'{}'", point.goal));
        }
        for (idx, point) in points.iter().enumerate() {
            self.push(format!("target_value({})", idx + 1), real(point.target));
        }
        for (idx, point) in points.iter().enumerate() {
            self.push(format!("weighting({})", idx + 1), real(point.weighting));
        }
        for (idx, point) in points.iter().enumerate() {
            if let Some(reynolds) = point.reynolds {
                self.push(format!("reynolds({})", idx + 1), real(reynolds));
            }
        }
    }
}

impl fmt::Display for NamelistGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "&{}", self.name)?;
        for entry in &self.entries {
            writeln!(f, "  {}", entry.text)?;
        }
        writeln!(f, "/")
    }
}

/// All groups of a namelist file in input order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NamelistDocument {
    groups: Vec<NamelistGroup>,
}

impl NamelistDocument {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Splits `input` into its groups. Text outside of groups is dropped.
    pub fn parse(input: &str) -> NamelistResult<Self> {
        let mut groups = Vec::new();
        let mut from = 0;
        while let Some(amp) = next_group_start(input, from) {
            let name_start = amp + 1;
            let name_len = input[name_start..]
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(input.len() - name_start);
            if name_len == 0 {
                from = name_start;
                continue;
            }
            let name = input[name_start..name_start + name_len].to_ascii_lowercase();
            let body_start = name_start + name_len;
            let (body_len, terminator) = group_end(&input[body_start..])
                .ok_or_else(|| NamelistError::Unterminated(name.clone()))?;
            groups.push(NamelistGroup::from_body(&name, &input[body_start..body_start + body_len])?);
            from = body_start + body_len + terminator;
        }
        log::debug!("read {} namelist groups", groups.len());
        Ok(Self { groups })
    }

    #[must_use]
    pub fn groups(&self) -> &[NamelistGroup] {
        &self.groups
    }

    #[must_use]
    pub fn group(&self, name: &str) -> Option<&NamelistGroup> {
        self.groups
            .iter()
            .find(|group| group.name.eq_ignore_ascii_case(name))
    }

    /// The group called `name`, appended empty when missing.
    pub fn group_mut(&mut self, name: &str) -> &mut NamelistGroup {
        let position = match self
            .groups
            .iter()
            .position(|group| group.name.eq_ignore_ascii_case(name))
        {
            Some(position) => position,
            None => {
                self.groups.push(NamelistGroup::new(name));
                self.groups.len() - 1
            }
        };
        &mut self.groups[position]
    }

    /// Sets `key` of `group` to a real value.
    pub fn set_real(&mut self, group: &str, key: &str, value: f64) {
        self.group_mut(group).set(key, &real(value));
    }

    /// Reads the op points of the `&operating_conditions` group.
    ///
    /// Missing entries default to a `spec-cl` / `target-drag` point at 0.0
    /// with weighting 1.0; missing names become `op_<index>`. A `reynolds`
    /// value of zero or less counts as "no override".
    pub fn operating_conditions(&self) -> NamelistResult<OperatingPointSet> {
        let group = self
            .group(GROUP)
            .ok_or_else(|| NamelistError::MissingGroup(GROUP.to_owned()))?;
        read_points(&group.assignments()?)
    }

    /// Replaces the op points of the `&operating_conditions` group, keeping
    /// its other keys. Point names are left out because the optimizer does
    /// not accept them.
    pub fn set_operating_conditions(&mut self, set: &OperatingPointSet) {
        let group = self.group_mut(GROUP);
        group.remove(&POINT_KEYS);
        group.push_points(set);
    }
}

impl fmt::Display for NamelistDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for group in &self.groups {
            write!(f, "{group}")?;
        }
        Ok(())
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn read_points(assignments: &Assignments) -> NamelistResult<OperatingPointSet> {
    let declared = number_at(assignments, "noppoint", 0)?.unwrap_or(0.0);
    if declared > MAX_OP_POINTS as f64 {
        return Err(NamelistError::TooManyPoints {
            key: "noppoint".to_owned(),
            count: declared as usize,
        });
    }
    let declared = declared.max(0.0) as usize;
    let listed = ["name", "op_mode", "op_point", "optimization_type", "target_value", "weighting"]
        .iter()
        .filter_map(|key| assignments.get(*key).map(Vec::len))
        .max()
        .unwrap_or(0);
    if declared != 0 && declared != listed {
        log::warn!("noppoint = {declared}, but {listed} op points are listed");
    }
    let count = declared.max(listed);

    let mut set = OperatingPointSet::new();
    for idx in 0..count {
        let name = text_at(assignments, "name", idx).unwrap_or_else(|| format!("op_{idx}"));
        let mode = match text_at(assignments, "op_mode", idx) {
            Some(mode) => mode.parse::<OpMode>()?,
            None => OpMode::SpecCl,
        };
        let goal = text_at(assignments, "optimization_type", idx)
            .map_or(OptimizationGoal::TargetDrag, OptimizationGoal::from);
        let value = number_at(assignments, "op_point", idx)?.unwrap_or(0.0);
        let target = number_at(assignments, "target_value", idx)?.unwrap_or(0.0);
        let weighting = number_at(assignments, "weighting", idx)?.unwrap_or(1.0);
        let reynolds = number_at(assignments, "reynolds", idx)?.filter(|re| *re > 0.0);

        let mut point = OperatingPoint::new(name, mode, value, goal, target).with_weighting(weighting);
        point.reynolds = reynolds;
        set.add_point(point)?;
    }

    log::debug!("read {} operating points from namelist", set.len());
    Ok(set)
}

/// Reads the `&operating_conditions` group of a namelist document.
pub fn parse_operating_conditions(input: &str) -> NamelistResult<OperatingPointSet> {
    NamelistDocument::parse(input)?.operating_conditions()
}

/// Formats a real so Fortran reads it as one.
fn real(value: f64) -> String {
    let text = value.to_string();
    if !value.is_finite() || text.contains(['.', 'e', 'E']) {
        text
    } else {
        format!("{text}.0")
    }
}

/// Renders `set` as a stand-alone `&operating_conditions` group.
///
/// `reynolds` is only written for points that override it.
#[must_use]
pub fn write_operating_conditions(set: &OperatingPointSet) -> String {
    let mut group = NamelistGroup::new(GROUP);
    group.push_points(set);
    group.to_string()
}
