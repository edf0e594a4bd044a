//! EmmyLua annotation comment parsing.
//!
//! Handles the `---@` comment dialect:
//!
//! ```lua
//! ---@class Player : Entity
//! ---@field hp number
//! ---@field name string|nil
//! ---@alias Id number
//! ---@param dt number
//! ---@return boolean
//! ---@type Player
//! ```
//!
//! Type expressions support builtin names, class/alias names, unions with
//! `|`, an optional `?` suffix (sugar for `|nil`), and `fun(...): R1, R2`.
//! Array sugar (`T[]`) degrades to `table`.

use crate::types::{CompactString, TypeRef};

/// One parsed annotation line.
#[derive(Debug, Clone, PartialEq)]
pub enum Annotation {
    Class {
        name: CompactString,
        superclass: Option<CompactString>,
    },
    Field {
        name: CompactString,
        ty: TypeRef,
    },
    Type(TypeRef),
    Alias {
        name: CompactString,
        target: TypeRef,
    },
    Param {
        name: CompactString,
        ty: TypeRef,
    },
    Return(Vec<TypeRef>),
}

/// Parse one comment line. Returns `None` for ordinary comments and
/// annotations we do not model.
pub fn parse_annotation(raw: &str) -> Option<Annotation> {
    let line = raw.trim().trim_start_matches('-').trim_start();
    let rest = line.strip_prefix('@')?;

    let (tag, args) = match rest.split_once(char::is_whitespace) {
        Some((tag, args)) => (tag, args.trim()),
        None => (rest, ""),
    };

    match tag {
        "class" => {
            if args.is_empty() {
                return None;
            }
            let (name_part, super_part) = match args.split_once(':') {
                Some((name, superclass)) => (name.trim(), Some(superclass.trim())),
                None => (args, None),
            };
            let name = first_word(name_part)?;
            let superclass = super_part.and_then(first_word);
            Some(Annotation::Class {
                name: name.into(),
                superclass: superclass.map(Into::into),
            })
        }
        "field" => {
            let (name, ty_text) = match args.split_once(char::is_whitespace) {
                Some((name, ty)) => (first_word(name)?, ty.trim()),
                None => (first_word(args)?, ""),
            };
            let ty = if ty_text.is_empty() {
                TypeRef::Any
            } else {
                parse_type_ref(ty_text)
            };
            Some(Annotation::Field {
                name: name.into(),
                ty,
            })
        }
        "type" => {
            if args.is_empty() {
                return None;
            }
            Some(Annotation::Type(parse_type_ref(args)))
        }
        "alias" => {
            let (name, target) = args.split_once(char::is_whitespace)?;
            let name = first_word(name)?;
            Some(Annotation::Alias {
                name: name.into(),
                target: parse_type_ref(target.trim()),
            })
        }
        "param" => {
            let (name, ty) = args.split_once(char::is_whitespace)?;
            let name = first_word(name)?;
            Some(Annotation::Param {
                name: name.into(),
                ty: parse_type_ref(ty.trim()),
            })
        }
        "return" => {
            if args.is_empty() {
                return None;
            }
            let returns = split_top_level(args, ',')
                .into_iter()
                .map(|part| parse_type_ref(part.trim()))
                .collect();
            Some(Annotation::Return(returns))
        }
        _ => None,
    }
}

/// Parse a type expression into a `TypeRef`.
pub fn parse_type_ref(text: &str) -> TypeRef {
    let text = text.trim();

    // optional sugar: `T?` is `T|nil`
    if let Some(inner) = text.strip_suffix('?') {
        let base = parse_type_ref(inner);
        return match base {
            TypeRef::Nil => TypeRef::Nil,
            other => TypeRef::Union(vec![other, TypeRef::Nil]),
        };
    }

    let parts = split_top_level(text, '|');
    if parts.len() > 1 {
        return TypeRef::Union(parts.into_iter().map(|p| parse_type_ref(p.trim())).collect());
    }

    if text.ends_with("[]") {
        return TypeRef::Table;
    }

    if let Some(rest) = text.strip_prefix("fun")
        && rest.starts_with('(')
    {
        let returns = match rest.rsplit_once("):") {
            Some((_, rets)) => split_top_level(rets.trim(), ',')
                .into_iter()
                .map(|part| parse_type_ref(part.trim()))
                .collect(),
            None => Vec::new(),
        };
        return TypeRef::Fun { returns };
    }

    match text {
        "nil" => TypeRef::Nil,
        "boolean" | "bool" => TypeRef::Boolean,
        "number" | "integer" => TypeRef::Number,
        "string" => TypeRef::String,
        "table" => TypeRef::Table,
        "any" => TypeRef::Any,
        name => TypeRef::Name(first_word(name).unwrap_or(name).into()),
    }
}

/// Split on `separator` at parenthesis/angle-bracket depth zero.
fn split_top_level(text: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '(' | '<' => depth += 1,
            ')' | '>' => depth -= 1,
            c if c == separator && depth == 0 => {
                parts.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

fn first_word(text: &str) -> Option<&str> {
    let word = text.trim().split_whitespace().next()?;
    if word.is_empty() { None } else { Some(word) }
}
