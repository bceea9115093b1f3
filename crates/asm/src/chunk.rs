use std::sync::Arc;

use indexmap::IndexMap;

use crate::span::Origin;
use crate::text;

/// Classification of one parsed unit of assembly source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChunkKind {
    Comment,
    Label,
    Constant,
    Macro,
    MacroInvocation,
    MacroInvocationParameter,
    PlainLine,
}

/// One classified unit of parsed assembly source. The variant set is closed;
/// every consumer dispatches by pattern match.
#[derive(Debug, Clone)]
pub enum Chunk {
    Comment(Comment),
    Label(Label),
    Macro(MacroDef),
    Invocation(Invocation),
    Line(SourceLine),
}

impl Chunk {
    pub fn origin(&self) -> &Origin {
        match self {
            Chunk::Comment(comment) => &comment.origin,
            Chunk::Label(label) => &label.origin,
            Chunk::Macro(def) => &def.origin,
            Chunk::Invocation(invocation) => &invocation.origin,
            Chunk::Line(line) => &line.origin,
        }
    }

    /// A plain line carrying a parsed define reports `Constant`; everything
    /// else maps one-to-one onto its variant.
    pub fn kind(&self) -> ChunkKind {
        match self {
            Chunk::Comment(_) => ChunkKind::Comment,
            Chunk::Label(_) => ChunkKind::Label,
            Chunk::Macro(_) => ChunkKind::Macro,
            Chunk::Invocation(_) => ChunkKind::MacroInvocation,
            Chunk::Line(line) if line.define.is_some() => ChunkKind::Constant,
            Chunk::Line(_) => ChunkKind::PlainLine,
        }
    }
}

/// Comment text with the leading semicolons stripped and whitespace
/// collapsed. The origin's `len` is the pre-modification trimmed line
/// length, which source reconstruction depends on.
#[derive(Debug, Clone)]
pub struct Comment {
    pub text: String,
    pub origin: Origin,
}

#[derive(Debug, Clone)]
pub struct Label {
    pub symbol: String,
    pub origin: Origin,
}

/// A named, parameterized block of lines terminated by `endm`.
#[derive(Debug, Clone)]
pub struct MacroDef {
    pub name: String,
    /// Explicit parameter names, or positional references (`\1`, `\2`, ...)
    /// inferred from the body when the header lists none. Inferred
    /// parameters are deduplicated and sorted lexically, so `\10` orders
    /// before `\2`; kept for compatibility with the original format.
    pub params: Vec<String>,
    pub body: Vec<Chunk>,
    /// False when the header line did not match `<name> macro [params]`.
    /// Invalid definitions keep their header position but have no body and
    /// are never resolvable.
    pub is_valid: bool,
    pub origin: Origin,
}

impl MacroDef {
    /// Re-derives the header text from the parsed name and parameter list.
    pub fn header_text(&self) -> String {
        if self.params.is_empty() {
            format!("{} macro", self.name)
        } else {
            format!("{} macro {}", self.name, self.params.join(","))
        }
    }
}

/// A source line that calls a previously defined macro. The target macro is
/// referenced by name only; resolution goes through the active session so
/// the invocation never owns its definition.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Macro name exactly as written at the callsite.
    pub name: String,
    pub args: Vec<Argument>,
    pub origin: Origin,
}

/// Raw text of one comma-separated invocation argument.
#[derive(Debug, Clone)]
pub struct Argument {
    pub text: String,
    pub origin: Origin,
}

impl Argument {
    pub fn kind(&self) -> ChunkKind {
        ChunkKind::MacroInvocationParameter
    }
}

/// An unclassified source line, kept verbatim for later structural
/// interpretation. Define detection happens at classification time so the
/// constant view over a file is a cheap filter.
#[derive(Debug, Clone)]
pub struct SourceLine {
    pub text: String,
    pub define: Option<Define>,
    pub origin: Origin,
}

/// A parsed `<name> = <value>` or `<name> equ <value>` structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Define {
    pub name: String,
    pub value: String,
}

impl Define {
    /// Attempts to read a define structure out of one line of source.
    pub fn parse(line: &str) -> Option<Define> {
        let normalized = text::normalize(line);
        if normalized.is_empty() || normalized.starts_with(';') {
            return None;
        }

        if let Some((left, right)) = normalized.split_once('=') {
            let name = left.trim();
            let value = right.trim();
            if is_identifier(name) && !value.is_empty() {
                return Some(Define {
                    name: name.to_string(),
                    value: value.to_string(),
                });
            }
            return None;
        }

        let mut words = normalized.split(' ');
        let name = words.next()?;
        let keyword = words.next()?;
        if !keyword.eq_ignore_ascii_case("equ") || !is_identifier(name) {
            return None;
        }
        let value = words.collect::<Vec<_>>().join(" ");
        if value.is_empty() {
            return None;
        }
        Some(Define {
            name: name.to_string(),
            value,
        })
    }
}

pub(crate) fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first.is_ascii_alphabetic() || first == '_' || first == '.') {
        return false;
    }
    chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '.')
}

/// Borrowed view of a constant definition: the defining line plus its index
/// in the owning file's chunk list. The index is the back-reference; the
/// file stays the only owner of the chunk.
#[derive(Debug, Clone, Copy)]
pub struct Constant<'a> {
    index: usize,
    line: &'a SourceLine,
}

impl<'a> Constant<'a> {
    /// The line must carry a successfully parsed define; anything else is a
    /// programming error at the construction site.
    pub fn new(index: usize, line: &'a SourceLine) -> Self {
        assert!(
            line.define.is_some(),
            "constant view requires a line with a parsed define"
        );
        Self { index, line }
    }

    pub fn name(&self) -> &'a str {
        &self.define().name
    }

    pub fn value(&self) -> &'a str {
        &self.define().value
    }

    pub fn chunk_index(&self) -> usize {
        self.index
    }

    pub fn line(&self) -> &'a SourceLine {
        self.line
    }

    fn define(&self) -> &'a Define {
        self.line
            .define
            .as_ref()
            .expect("checked at construction")
    }
}

/// A fully imported assembly source file: the ordered chunk sequence plus
/// derived lookup tables for the macros and constants it defines. Populated
/// once by the importer and immutable afterwards; derived file types clone
/// it instead of re-parsing.
#[derive(Debug, Clone)]
pub struct AsmFile {
    path: Arc<str>,
    chunks: Vec<Chunk>,
    macro_index: IndexMap<String, usize>,
    constant_index: IndexMap<String, usize>,
}

impl AsmFile {
    pub(crate) fn from_chunks(path: Arc<str>, chunks: Vec<Chunk>) -> Self {
        let mut macro_index = IndexMap::new();
        let mut constant_index = IndexMap::new();
        for (index, chunk) in chunks.iter().enumerate() {
            match chunk {
                Chunk::Macro(def) if def.is_valid => {
                    macro_index
                        .entry(def.name.to_ascii_lowercase())
                        .or_insert(index);
                }
                Chunk::Line(line) => {
                    if let Some(define) = &line.define {
                        constant_index
                            .entry(define.name.to_ascii_lowercase())
                            .or_insert(index);
                    }
                }
                _ => {}
            }
        }

        Self {
            path,
            chunks,
            macro_index,
            constant_index,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn chunk(&self, index: usize) -> Option<&Chunk> {
        self.chunks.get(index)
    }

    /// Valid macro definitions in source order.
    pub fn macros(&self) -> impl Iterator<Item = &MacroDef> {
        self.macro_index.values().filter_map(|&index| {
            match &self.chunks[index] {
                Chunk::Macro(def) => Some(def),
                _ => None,
            }
        })
    }

    /// Case-insensitive macro lookup; first definition wins.
    pub fn macro_named(&self, name: &str) -> Option<&MacroDef> {
        let index = *self.macro_index.get(&name.to_ascii_lowercase())?;
        match &self.chunks[index] {
            Chunk::Macro(def) => Some(def),
            _ => None,
        }
    }

    /// Constant definitions in source order.
    pub fn constants(&self) -> impl Iterator<Item = Constant<'_>> {
        self.constant_index.values().filter_map(|&index| {
            match &self.chunks[index] {
                Chunk::Line(line) => Some(Constant::new(index, line)),
                _ => None,
            }
        })
    }

    /// Case-insensitive constant lookup; first definition wins.
    pub fn constant_named(&self, name: &str) -> Option<Constant<'_>> {
        let index = *self.constant_index.get(&name.to_ascii_lowercase())?;
        match &self.chunks[index] {
            Chunk::Line(line) => Some(Constant::new(index, line)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_assignment_define() {
        let define = Define::parse("SPEED = 4").expect("define");
        assert_eq!(define.name, "SPEED");
        assert_eq!(define.value, "4");
    }

    #[test]
    fn parses_equ_define_case_insensitively() {
        let define = Define::parse("bar EQU $1F").expect("define");
        assert_eq!(define.name, "bar");
        assert_eq!(define.value, "$1F");
    }

    #[test]
    fn rejects_non_define_lines() {
        assert!(Define::parse("lda #$10").is_none());
        assert!(Define::parse("; SPEED = 4").is_none());
        assert!(Define::parse("1bad = 2").is_none());
        assert!(Define::parse("name =").is_none());
    }

    #[test]
    fn plain_line_with_define_reports_constant_kind() {
        let origin = Origin::new("test.asm".into(), 0, 9, 1);
        let chunk = Chunk::Line(SourceLine {
            text: "SPEED = 4".to_string(),
            define: Define::parse("SPEED = 4"),
            origin,
        });
        assert_eq!(chunk.kind(), ChunkKind::Constant);
    }

    #[test]
    #[should_panic(expected = "parsed define")]
    fn constant_view_rejects_plain_lines() {
        let origin = Origin::new("test.asm".into(), 0, 3, 1);
        let line = SourceLine {
            text: "nop".to_string(),
            define: None,
            origin,
        };
        let _ = Constant::new(0, &line);
    }

    #[test]
    fn macro_header_text_round_trips_name_and_params() {
        let origin = Origin::new("test.asm".into(), 0, 0, 1);
        let def = MacroDef {
            name: "jump".to_string(),
            params: vec!["a".to_string(), "b".to_string()],
            body: Vec::new(),
            is_valid: true,
            origin,
        };
        assert_eq!(def.header_text(), "jump macro a,b");
    }
}
