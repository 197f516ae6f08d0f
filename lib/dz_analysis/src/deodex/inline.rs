//! Inline method tables used to resolve `execute-inline` instructions.

use crate::classpath::{ClassPath, MethodKind};
use crate::errors::{AnalysisError, AnalysisResult};
use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;
use std::fs;
use std::path::Path;

/// How an inline method is called once deodexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokeKind {
    Virtual,
    Direct,
    Static,
}

/// An entry of an inline method table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineMethod {
    kind: InvokeKind,
    class: String,
    name: String,
    parameters: String,
    return_type: String,
}

impl InlineMethod {
    #[must_use]
    pub fn new(kind: InvokeKind, class: &str, name: &str, parameters: &str, return_type: &str) -> Self {
        Self {
            kind,
            class: class.to_string(),
            name: name.to_string(),
            parameters: parameters.to_string(),
            return_type: return_type.to_string(),
        }
    }

    #[inline]
    #[must_use]
    pub const fn kind(&self) -> InvokeKind {
        self.kind
    }

    #[inline]
    #[must_use]
    pub fn class(&self) -> &str {
        &self.class
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Concatenated parameter descriptors.
    #[inline]
    #[must_use]
    pub fn parameters(&self) -> &str {
        &self.parameters
    }

    #[inline]
    #[must_use]
    pub fn return_type(&self) -> &str {
        &self.return_type
    }

    /// Method string without the class, as found in vtables.
    #[must_use]
    pub fn short_string(&self) -> String {
        format!("{}({}){}", self.name, self.parameters, self.return_type)
    }
}

impl fmt::Display for InlineMethod {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}->{}({}){}",
            self.class, self.name, self.parameters, self.return_type
        )
    }
}

fn virtual_(class: &str, name: &str, parameters: &str, return_type: &str) -> InlineMethod {
    InlineMethod::new(InvokeKind::Virtual, class, name, parameters, return_type)
}

fn static_(class: &str, name: &str, parameters: &str, return_type: &str) -> InlineMethod {
    InlineMethod::new(InvokeKind::Static, class, name, parameters, return_type)
}

const STRING: &str = "Ljava/lang/String;";
const MATH: &str = "Ljava/lang/Math;";

fn common_prefix() -> Vec<InlineMethod> {
    vec![
        static_(
            "Lorg/apache/harmony/dalvik/NativeTestTarget;",
            "emptyInlineMethod",
            "",
            "V",
        ),
        virtual_(STRING, "charAt", "I", "C"),
        virtual_(STRING, "compareTo", STRING, "I"),
        virtual_(STRING, "equals", "Ljava/lang/Object;", "Z"),
    ]
}

fn math_methods() -> Vec<InlineMethod> {
    vec![
        static_(MATH, "abs", "I", "I"),
        static_(MATH, "abs", "J", "J"),
        static_(MATH, "abs", "F", "F"),
        static_(MATH, "abs", "D", "D"),
        static_(MATH, "min", "II", "I"),
        static_(MATH, "max", "II", "I"),
        static_(MATH, "sqrt", "D", "D"),
        static_(MATH, "cos", "D", "D"),
        static_(MATH, "sin", "D", "D"),
    ]
}

lazy_static! {
    static ref VERSION_35: Vec<InlineMethod> = {
        let mut methods = common_prefix();
        methods.push(virtual_(STRING, "length", "", "I"));
        methods.extend(math_methods());
        methods
    };

    // Slots 4 and 5 are left empty: their content changed between two runtime releases
    // sharing the same odex version.
    static ref VERSION_36: Vec<Option<InlineMethod>> = {
        let mut methods: Vec<Option<InlineMethod>> = common_prefix().into_iter().map(Some).collect();
        methods.extend([None, None, Some(virtual_(STRING, "length", "", "I"))]);
        methods.extend(math_methods().into_iter().map(Some));
        for (class, name, parameters, return_type) in [
            ("Ljava/lang/Float;", "floatToIntBits", "F", "I"),
            ("Ljava/lang/Float;", "floatToRawIntBits", "F", "I"),
            ("Ljava/lang/Float;", "intBitsToFloat", "I", "F"),
            ("Ljava/lang/Double;", "doubleToLongBits", "D", "J"),
            ("Ljava/lang/Double;", "doubleToRawLongBits", "D", "J"),
            ("Ljava/lang/Double;", "longBitsToDouble", "J", "D"),
            ("Ljava/lang/StrictMath;", "abs", "I", "I"),
            ("Ljava/lang/StrictMath;", "abs", "J", "J"),
            ("Ljava/lang/StrictMath;", "abs", "F", "F"),
            ("Ljava/lang/StrictMath;", "abs", "D", "D"),
            ("Ljava/lang/StrictMath;", "min", "II", "I"),
            ("Ljava/lang/StrictMath;", "max", "II", "I"),
            ("Ljava/lang/StrictMath;", "sqrt", "D", "D"),
        ] {
            methods.push(Some(static_(class, name, parameters, return_type)));
        }
        methods
    };

    // candidates of the ambiguous version 36 slots, keyed by argument registers count
    static ref VERSION_36_SLOT_4: [(usize, InlineMethod); 2] = [
        (2, virtual_(STRING, "indexOf", "I", "I")),
        (3, InlineMethod::new(InvokeKind::Direct, STRING, "fastIndexOf", "II", "I")),
    ];
    static ref VERSION_36_SLOT_5: [(usize, InlineMethod); 2] = [
        (3, virtual_(STRING, "indexOf", "II", "I")),
        (1, virtual_(STRING, "isEmpty", "", "Z")),
    ];

    static ref LONG_METHOD: Regex =
        Regex::new(r"^(L[^;]+;)->([^(]+)\(([^)]*)\)(.+)$").expect("long method regex");
}

/// Maps the index of an `execute-inline` instruction to the inlined method.
#[derive(Debug, Clone)]
pub enum InlineMethodResolver {
    Version35,
    Version36,
    Custom(Vec<InlineMethod>),
}

impl InlineMethodResolver {
    /// Built-in table of the given odex version.
    pub fn for_version(version: u32) -> AnalysisResult<Self> {
        match version {
            35 => Ok(Self::Version35),
            36 => Ok(Self::Version36),
            _ => Err(AnalysisError::config(format!(
                "odex version {version} is not supported yet"
            ))),
        }
    }

    /// Reads a custom table, one `Lclass;->name(params)ret` descriptor per line.
    ///
    /// Every method must exist in the class path, which also gives its dispatch kind.
    pub fn from_file<P: AsRef<Path>>(path: P, class_path: &ClassPath) -> AnalysisResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|_| {
            AnalysisError::config(format!(
                "Could not find inline table file: {}",
                path.display()
            ))
        })?;
        let methods = content
            .lines()
            .filter(|line| !line.is_empty())
            .map(|line| parse_inline_method(line, class_path))
            .collect::<AnalysisResult<Vec<_>>>()?;
        log::debug!("{} inline methods read from {}", methods.len(), path.display());
        Ok(Self::Custom(methods))
    }

    /// Resolves an inline index. `arguments` is the number of registers passed by the
    /// instruction, used to disambiguate entries that differ between runtime releases.
    pub fn resolve(&self, index: u16, arguments: usize) -> AnalysisResult<&InlineMethod> {
        let idx = usize::from(index);
        let invalid = || AnalysisError::resolution(format!("Invalid inline index: {index}"));
        match self {
            Self::Version35 => VERSION_35.get(idx).ok_or_else(invalid),
            Self::Custom(methods) => methods.get(idx).ok_or_else(invalid),
            Self::Version36 => {
                let candidates: &[(usize, InlineMethod)] = match idx {
                    4 => &*VERSION_36_SLOT_4,
                    5 => &*VERSION_36_SLOT_5,
                    _ => {
                        return VERSION_36
                            .get(idx)
                            .and_then(Option::as_ref)
                            .ok_or_else(invalid)
                    }
                };
                candidates
                    .iter()
                    .find(|(count, _)| *count == arguments)
                    .map(|(_, method)| method)
                    .ok_or_else(|| {
                        AnalysisError::resolution(
                            "Could not determine the correct inline method to use",
                        )
                    })
            }
        }
    }
}

fn parse_inline_method(line: &str, class_path: &ClassPath) -> AnalysisResult<InlineMethod> {
    let caps = LONG_METHOD
        .captures(line)
        .ok_or_else(|| AnalysisError::config(format!("Invalid method descriptor: {line}")))?;
    let (class, name, parameters, return_type) = (&caps[1], &caps[2], &caps[3], &caps[4]);

    let class_def = class_path.class_def(class, false)?;
    let kind = match class_def.method_type(&format!("{name}({parameters}){return_type}")) {
        Some(MethodKind::Virtual(_)) => InvokeKind::Virtual,
        Some(MethodKind::Direct) => InvokeKind::Direct,
        Some(MethodKind::Static) => InvokeKind::Static,
        None => {
            return Err(AnalysisError::config(format!(
                "Cannot resolve inline method: {line}"
            )))
        }
    };
    Ok(InlineMethod::new(kind, class, name, parameters, return_type))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use std::io::Write;

    #[test]
    fn version_35() {
        let resolver = InlineMethodResolver::for_version(35).unwrap();
        let method = resolver.resolve(0, 0).unwrap();
        assert_eq!(method.kind(), InvokeKind::Static);
        assert_eq!(
            method.to_string(),
            "Lorg/apache/harmony/dalvik/NativeTestTarget;->emptyInlineMethod()V"
        );
        assert_eq!(resolver.resolve(4, 1).unwrap().short_string(), "length()I");
        assert_eq!(resolver.resolve(13, 2).unwrap().to_string(), "Ljava/lang/Math;->sin(D)D");
        assert_eq!(
            resolver.resolve(14, 0).unwrap_err().to_string(),
            "Invalid inline index: 14"
        );
    }

    #[test]
    fn version_36_ambiguous_slots() {
        let resolver = InlineMethodResolver::for_version(36).unwrap();
        assert_eq!(resolver.resolve(4, 2).unwrap().short_string(), "indexOf(I)I");
        let fast = resolver.resolve(4, 3).unwrap();
        assert_eq!(fast.short_string(), "fastIndexOf(II)I");
        assert_eq!(fast.kind(), InvokeKind::Direct);
        assert_eq!(resolver.resolve(5, 3).unwrap().short_string(), "indexOf(II)I");
        assert_eq!(resolver.resolve(5, 1).unwrap().short_string(), "isEmpty()Z");
        assert_eq!(
            resolver.resolve(5, 2).unwrap_err().to_string(),
            "Could not determine the correct inline method to use"
        );
        assert_eq!(resolver.resolve(6, 1).unwrap().short_string(), "length()I");
        assert_eq!(
            resolver.resolve(28, 2).unwrap().to_string(),
            "Ljava/lang/StrictMath;->sqrt(D)D"
        );
        assert!(resolver.resolve(29, 0).is_err());
    }

    #[test]
    fn unsupported_version() {
        let err = InlineMethodResolver::for_version(37).unwrap_err();
        assert_eq!(err.to_string(), "odex version 37 is not supported yet");
    }

    #[test]
    fn custom_table() {
        let class_path = testing::class_path();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Ljava/lang/String;->length()I").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "Ljava/lang/Object;-><init>()V").unwrap();
        let resolver = InlineMethodResolver::from_file(file.path(), &class_path).unwrap();

        let length = resolver.resolve(0, 1).unwrap();
        assert_eq!(length.kind(), InvokeKind::Virtual);
        assert_eq!(length.class(), "Ljava/lang/String;");
        assert_eq!(resolver.resolve(1, 1).unwrap().kind(), InvokeKind::Direct);
        assert!(resolver.resolve(2, 0).is_err());
    }

    #[test]
    fn custom_table_errors() {
        let class_path = testing::class_path();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Ljava/lang/String;->nope()I").unwrap();
        let err = InlineMethodResolver::from_file(file.path(), &class_path).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot resolve inline method: Ljava/lang/String;->nope()I"
        );

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "java/lang/String.length()").unwrap();
        let err = InlineMethodResolver::from_file(file.path(), &class_path).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid method descriptor: java/lang/String.length()"
        );

        let err = InlineMethodResolver::from_file("/nonexistent/table.txt", &class_path).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Could not find inline table file: /nonexistent/table.txt"
        );
    }
}
