//! Parsing of type expressions and type declarations.
//!
//! Supports:
//! - Type expressions: `String`, `String[]`, `List<String>` (generic arguments of a
//!   concrete type are erased to its raw name), and type variables of the
//!   declaration being parsed.
//! - Declarations: `class Long extends Number implements Comparable<Long>`,
//!   `interface BinaryOperator<T> extends BiFunction<T, T, T>`.

use std::sync::Arc;

use crate::descriptor::TypeDescriptor;
use crate::registry::{DeclKind, ParentRef, TypeDecl, TypeRef};

/// A type expression or declaration that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid type expression `{input}`: {message}")]
pub struct TypeParseError {
    pub input: String,
    pub message: String,
}

impl TypeParseError {
    fn new(input: &str, message: impl Into<String>) -> Self {
        Self {
            input: input.to_string(),
            message: message.into(),
        }
    }
}

/// Parse a concrete type expression into a descriptor.
///
/// ```
/// use opchain_types::type_parsing::parse_descriptor;
///
/// let ty = parse_descriptor("List<String>[]").unwrap();
/// assert_eq!(ty.to_string(), "List[]");
/// ```
pub fn parse_descriptor(expr: &str) -> Result<TypeDescriptor, TypeParseError> {
    match parse_type_ref(expr, &[])? {
        TypeRef::Concrete(descriptor) => Ok(descriptor),
        TypeRef::Var(name) => Err(TypeParseError::new(
            expr,
            format!("`{name}` is a type variable"),
        )),
    }
}

/// Parse a type expression in the scope of the given type parameters.
pub fn parse_type_ref(expr: &str, params: &[Arc<str>]) -> Result<TypeRef, TypeParseError> {
    let trimmed = expr.trim();
    let mut base = trimmed;
    let mut depth: u8 = 0;
    while let Some(stripped) = base.strip_suffix("[]") {
        base = stripped.trim_end();
        depth = depth
            .checked_add(1)
            .ok_or_else(|| TypeParseError::new(expr, "too many array dimensions"))?;
    }

    let (name, args) = split_generic(base).map_err(|message| TypeParseError::new(expr, message))?;
    validate_identifier(name).map_err(|message| TypeParseError::new(expr, message))?;

    if let Some(param) = params.iter().find(|param| &***param == name) {
        if args.is_some() {
            return Err(TypeParseError::new(
                expr,
                "type variables cannot take arguments",
            ));
        }
        if depth > 0 {
            return Err(TypeParseError::new(
                expr,
                "arrays of type variables are not supported",
            ));
        }
        return Ok(TypeRef::Var(param.clone()));
    }

    // Arguments of a concrete type only need to be well formed; they are erased.
    if let Some(args) = args {
        for arg in split_type_params(args) {
            parse_type_ref(arg, params)?;
        }
    }

    let mut descriptor = TypeDescriptor::named(name);
    for _ in 0..depth {
        descriptor = descriptor.array_of();
    }
    Ok(TypeRef::Concrete(descriptor))
}

/// Parse a full type declaration.
///
/// Grammar: `(class|interface) Name[<P, ...>] [extends Parent<...>[, ...]] [implements I<...>[, ...]]`.
/// A class has at most one superclass; an interface lists its super-interfaces under
/// `extends` and may not use `implements`.
pub fn parse_declaration(source: &str) -> Result<TypeDecl, TypeParseError> {
    let trimmed = source.trim();
    let (kind, rest) = if let Some(rest) = trimmed.strip_prefix("class ") {
        (DeclKind::Class, rest)
    } else if let Some(rest) = trimmed.strip_prefix("interface ") {
        (DeclKind::Interface, rest)
    } else {
        return Err(TypeParseError::new(
            source,
            "declaration must start with `class` or `interface`",
        ));
    };

    let extends_at = rest.find(" extends ");
    let implements_at = rest.find(" implements ");
    if let (Some(extends), Some(implements)) = (extends_at, implements_at) {
        if implements < extends {
            return Err(TypeParseError::new(
                source,
                "`extends` must come before `implements`",
            ));
        }
    }

    let header_end = [extends_at, implements_at]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(rest.len());
    let header = rest[..header_end].trim();
    let extends_part = extends_at.map(|start| {
        let end = implements_at.unwrap_or(rest.len());
        &rest[start + " extends ".len()..end]
    });
    let implements_part = implements_at.map(|start| &rest[start + " implements ".len()..]);

    let (name, param_list) =
        split_generic(header).map_err(|message| TypeParseError::new(source, message))?;
    validate_identifier(name).map_err(|message| TypeParseError::new(source, message))?;

    let mut params: Vec<Arc<str>> = Vec::new();
    if let Some(list) = param_list {
        for param in split_type_params(list) {
            validate_identifier(param).map_err(|message| TypeParseError::new(source, message))?;
            if params.iter().any(|existing| &**existing == param) {
                return Err(TypeParseError::new(
                    source,
                    format!("duplicate type parameter `{param}`"),
                ));
            }
            params.push(Arc::from(param));
        }
        if params.is_empty() {
            return Err(TypeParseError::new(source, "empty type parameter list"));
        }
    }

    let extends = match extends_part {
        Some(part) => parse_parent_list(source, part, &params)?,
        None => Vec::new(),
    };
    let implements = match implements_part {
        Some(part) => parse_parent_list(source, part, &params)?,
        None => Vec::new(),
    };

    let (superclass, interfaces) = match kind {
        DeclKind::Class => {
            if extends.len() > 1 {
                return Err(TypeParseError::new(
                    source,
                    "a class can extend at most one superclass",
                ));
            }
            (extends.into_iter().next(), implements)
        }
        DeclKind::Interface => {
            if !implements.is_empty() {
                return Err(TypeParseError::new(
                    source,
                    "an interface extends other interfaces; `implements` is not allowed",
                ));
            }
            (None, extends)
        }
    };

    Ok(TypeDecl {
        kind,
        descriptor: TypeDescriptor::named(name),
        params,
        superclass,
        interfaces,
    })
}

fn parse_parent_list(
    source: &str,
    part: &str,
    params: &[Arc<str>],
) -> Result<Vec<ParentRef>, TypeParseError> {
    let entries = split_type_params(part);
    if entries.is_empty() {
        return Err(TypeParseError::new(source, "empty parent list"));
    }
    entries
        .into_iter()
        .map(|entry| parse_parent(source, entry, params))
        .collect()
}

fn parse_parent(source: &str, entry: &str, params: &[Arc<str>]) -> Result<ParentRef, TypeParseError> {
    let (name, args) = split_generic(entry).map_err(|message| TypeParseError::new(source, message))?;
    validate_identifier(name).map_err(|message| TypeParseError::new(source, message))?;
    if params.iter().any(|param| &**param == name) {
        return Err(TypeParseError::new(
            source,
            format!("cannot inherit from type variable `{name}`"),
        ));
    }
    let args = match args {
        Some(list) => split_type_params(list)
            .into_iter()
            .map(|arg| parse_type_ref(arg, params))
            .collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };
    Ok(ParentRef {
        target: TypeDescriptor::named(name),
        args,
    })
}

/// Split `Name<args>` into `("Name", Some("args"))`.
fn split_generic(expr: &str) -> Result<(&str, Option<&str>), String> {
    let expr = expr.trim();
    let Some(open) = expr.find('<') else {
        if expr.contains('>') {
            return Err("unbalanced `>`".to_string());
        }
        return Ok((expr, None));
    };
    let inner = expr[open + 1..]
        .strip_suffix('>')
        .ok_or_else(|| "generic arguments must end with `>`".to_string())?;

    let mut depth = 0i32;
    for c in inner.chars() {
        match c {
            '<' => depth += 1,
            '>' => {
                depth -= 1;
                if depth < 0 {
                    return Err("unbalanced `>`".to_string());
                }
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err("unbalanced `<`".to_string());
    }
    Ok((expr[..open].trim(), Some(inner)))
}

fn validate_identifier(name: &str) -> Result<(), String> {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        Some(_) => return Err(format!("`{name}` is not a valid type name")),
        None => return Err("missing type name".to_string()),
    }
    if chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '$')) {
        Ok(())
    } else {
        Err(format!("`{name}` is not a valid type name"))
    }
}

/// Split type parameters respecting nested angle brackets.
///
/// Given "A, B<C, D>, E", returns ["A", "B<C, D>", "E"] by tracking bracket depth.
pub fn split_type_params(s: &str) -> Vec<&str> {
    let mut result = Vec::new();
    let mut depth = 0;
    let mut start = 0;

    for (i, c) in s.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => depth -= 1,
            ',' if depth == 0 => {
                result.push(s[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }

    let last = s[start..].trim();
    if !last.is_empty() {
        result.push(last);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_descriptor_arrays_and_erasure() {
        assert_eq!(parse_descriptor("String").unwrap(), TypeDescriptor::named("String"));
        assert_eq!(
            parse_descriptor(" Long[][] ").unwrap(),
            TypeDescriptor::named("Long").array_of().array_of()
        );
        assert_eq!(
            parse_descriptor("Map<String, List<Long>>").unwrap(),
            TypeDescriptor::named("Map")
        );
    }

    #[test]
    fn test_parse_descriptor_rejects_garbage() {
        assert!(parse_descriptor("").is_err());
        assert!(parse_descriptor("9Lives").is_err());
        assert!(parse_descriptor("List<String").is_err());
        assert!(parse_descriptor("List>").is_err());
        assert!(parse_descriptor("has space").is_err());
    }

    #[test]
    fn test_type_variables_resolve_in_scope() {
        let params: Vec<Arc<str>> = vec![Arc::from("T")];
        assert_eq!(parse_type_ref("T", &params).unwrap(), TypeRef::Var(Arc::from("T")));
        assert!(parse_type_ref("T[]", &params).is_err());
        assert!(matches!(
            parse_type_ref("List<T>", &params).unwrap(),
            TypeRef::Concrete(ref d) if d.name() == "List"
        ));
    }

    #[test]
    fn test_parse_class_declaration() {
        let decl = parse_declaration("class Long extends Number implements Comparable<Long>").unwrap();
        assert_eq!(decl.kind, DeclKind::Class);
        assert_eq!(decl.descriptor.name(), "Long");
        assert!(decl.params.is_empty());
        assert_eq!(decl.superclass.as_ref().unwrap().target.name(), "Number");
        assert_eq!(decl.interfaces.len(), 1);
        assert_eq!(
            decl.interfaces[0].args,
            vec![TypeRef::Concrete(TypeDescriptor::named("Long"))]
        );
    }

    #[test]
    fn test_parse_generic_interface_declaration() {
        let decl = parse_declaration("interface BinaryOperator<T> extends BiFunction<T, T, T>").unwrap();
        assert_eq!(decl.kind, DeclKind::Interface);
        assert_eq!(decl.params, vec![Arc::<str>::from("T")]);
        assert!(decl.superclass.is_none());
        assert_eq!(decl.interfaces[0].target.name(), "BiFunction");
        assert_eq!(decl.interfaces[0].args.len(), 3);
    }

    #[test]
    fn test_parse_declaration_errors() {
        assert!(parse_declaration("struct Foo").is_err());
        assert!(parse_declaration("class Foo extends A, B").is_err());
        assert!(parse_declaration("interface Foo implements Bar").is_err());
        assert!(parse_declaration("class Foo<T, T>").is_err());
        assert!(parse_declaration("class Foo<T> extends T").is_err());
        assert!(parse_declaration("class Foo implements A extends B").is_err());
    }

    #[test]
    fn test_split_type_params() {
        let params = split_type_params("Long, Map<String, Long>, Boolean");
        assert_eq!(params, vec!["Long", "Map<String, Long>", "Boolean"]);
        assert!(split_type_params("  ").is_empty());
    }
}
