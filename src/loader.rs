//! Loading IR modules from on-disk input.
//!
//! Parsing real LLVM bitcode is explicitly out of scope for this crate;
//! this loader instead reads a small line-oriented textual encoding that
//! exercises exactly the IR contract fixed by [`crate::ir`] (modules of
//! functions of blocks of instructions-plus-terminator, typed loads,
//! named calls, debug locations). Swapping in a real bitcode reader would
//! only change this module — the core never looks at `Path`s or file
//! contents.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::ir::builder::{BuilderError, FunctionBuilder, ModuleBuilder};
use crate::ir::{BinOp, BlockId, CmpPred, DebugLoc, Module, Type, ValueId};

/// Failure to load a module from disk. The driver treats this as "log and
/// skip the file," never as fatal.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io { path: String, #[source] source: std::io::Error },
    #[error("{path}:{line}: {message}")]
    Parse { path: String, line: usize, message: String },
    #[error("{path}: {0}", .0 = .source)]
    Builder { path: String, source: BuilderError },
}

/// Load a module from a textual IR file. See the module docs for the
/// (non-bitcode) input format this accepts.
pub fn load_module(path: &Path) -> Result<Module, LoadError> {
    let path_display = path.display().to_string();
    let text = fs::read_to_string(path).map_err(|source| LoadError::Io { path: path_display.clone(), source })?;
    parse_module(&text, &path_display)
}

fn err(path: &str, line: usize, message: impl Into<String>) -> LoadError {
    LoadError::Parse { path: path.to_owned(), line, message: message.into() }
}

/// Parse the textual IR format described in the module docs.
pub fn parse_module(text: &str, path: &str) -> Result<Module, LoadError> {
    let mut lines = text.lines().enumerate().peekable();

    let module_name = loop {
        match lines.next() {
            Some((_, l)) if l.trim().is_empty() => continue,
            Some((ln, l)) => {
                let rest = l
                    .trim()
                    .strip_prefix("module:")
                    .ok_or_else(|| err(path, ln + 1, "expected `module: <name>`"))?;
                break rest.trim().to_owned();
            }
            None => return Err(err(path, 0, "empty input")),
        }
    };

    let mut module = ModuleBuilder::new(module_name);

    while let Some(&(ln, l)) = lines.peek() {
        let trimmed = l.trim();
        if trimmed.is_empty() {
            lines.next();
            continue;
        }
        let Some(name) = trimmed.strip_prefix("function:") else {
            return Err(err(path, ln + 1, format!("expected `function:` or end of input, got `{trimmed}`")));
        };
        let name = name.trim().to_owned();
        lines.next();
        let function = parse_function(&mut lines, path, name)?;
        module.add_function(function);
    }

    Ok(module.build())
}

type Lines<'a> = std::iter::Peekable<std::iter::Enumerate<std::str::Lines<'a>>>;

fn parse_function(lines: &mut Lines<'_>, path: &str, name: String) -> Result<crate::ir::Function, LoadError> {
    let mut fb = FunctionBuilder::new(name);
    let mut current = fb.entry();
    let mut declared_blocks = vec![current];

    loop {
        let Some((ln, raw)) = lines.next() else {
            return Err(err(path, 0, "unexpected end of input inside function"));
        };
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        if line == "endfunction" {
            break;
        }
        if let Some(rest) = line.strip_prefix("block ") {
            let idx: usize = rest
                .trim_end_matches(':')
                .trim()
                .parse()
                .map_err(|_| err(path, ln + 1, "bad block id"))?;
            while declared_blocks.len() <= idx {
                declared_blocks.push(fb.new_block());
            }
            current = declared_blocks[idx];
            continue;
        }
        parse_instruction(&mut fb, path, ln + 1, line, current, &declared_blocks)?;
    }

    fb.build().map_err(|source| LoadError::Builder { path: path.to_owned(), source })
}

fn parse_value_ref(tok: &str) -> Option<ValueId> {
    tok.trim().trim_end_matches(',').strip_prefix('v')?.parse::<usize>().ok().map(ValueId)
}

fn split_loc(body: &str) -> (&str, Option<DebugLoc>) {
    if let Some(idx) = body.find('@') {
        let (head, tail) = body.split_at(idx);
        let tail = tail[1..].trim();
        let mut parts = tail.split_whitespace();
        if let (Some(dir), Some(file), Some(line)) = (parts.next(), parts.next(), parts.next()) {
            if let Ok(line) = line.parse::<u32>() {
                return (
                    head.trim(),
                    Some(DebugLoc { dir: dir.to_owned(), file: file.to_owned(), line }),
                );
            }
        }
        (head.trim(), None)
    } else {
        (body.trim(), None)
    }
}

fn block_id_at(path: &str, ln: usize, declared: &[BlockId], idx: usize) -> Result<BlockId, LoadError> {
    declared.get(idx).copied().ok_or_else(|| err(path, ln, format!("reference to undeclared block {idx}")))
}

#[allow(clippy::too_many_lines)]
fn parse_instruction(
    fb: &mut FunctionBuilder,
    path: &str,
    ln: usize,
    line: &str,
    block: BlockId,
    declared_blocks: &[BlockId],
) -> Result<(), LoadError> {
    let (body, loc) = split_loc(line);

    if let Some(rest) = body.strip_prefix("br ") {
        let idx: usize = rest.trim().parse().map_err(|_| err(path, ln, "bad branch target"))?;
        let target = block_id_at(path, ln, declared_blocks, idx)?;
        fb.br(block, target);
        return Ok(());
    }
    if let Some(rest) = body.strip_prefix("condbr ") {
        let mut parts = rest.split(',').map(str::trim);
        let cond = parts.next().and_then(parse_value_ref).ok_or_else(|| err(path, ln, "bad condbr condition"))?;
        let if_true: usize = parts
            .next()
            .ok_or_else(|| err(path, ln, "missing condbr true target"))?
            .parse()
            .map_err(|_| err(path, ln, "bad condbr true target"))?;
        let if_false: usize = parts
            .next()
            .ok_or_else(|| err(path, ln, "missing condbr false target"))?
            .parse()
            .map_err(|_| err(path, ln, "bad condbr false target"))?;
        let if_true = block_id_at(path, ln, declared_blocks, if_true)?;
        let if_false = block_id_at(path, ln, declared_blocks, if_false)?;
        fb.cond_br(block, cond, if_true, if_false);
        return Ok(());
    }

    let Some((dst, rhs)) = body.split_once('=') else {
        return Err(err(path, ln, format!("expected `vN = ...` or a terminator, got `{body}`")));
    };
    let dst = dst.trim();
    if !dst.starts_with('v') {
        return Err(err(path, ln, format!("bad destination `{dst}`")));
    }
    let rhs = rhs.trim();

    let (op, args) = rhs.split_once(' ').unwrap_or((rhs, ""));
    let args = args.trim();

    let id = match op {
        "alloca" => fb.alloca(block),
        "global" => fb.global(args.trim_matches('"')),
        "const_int" => {
            let value: i64 = args.parse().map_err(|_| err(path, ln, "bad const_int value"))?;
            fb.const_int(value)
        }
        "null" => fb.null_ptr(),
        "constant_expr" => {
            let operand = parse_value_ref(args).ok_or_else(|| err(path, ln, "bad constant_expr operand"))?;
            fb.constant_expr(operand)
        }
        "bitcast" => {
            let operand = parse_value_ref(args).ok_or_else(|| err(path, ln, "bad bitcast operand"))?;
            fb.bitcast(block, operand)
        }
        "gep" => {
            let mut parts = args.split(',').filter_map(parse_value_ref);
            let base = parts.next().ok_or_else(|| err(path, ln, "gep requires a base operand"))?;
            let indices: Vec<ValueId> = parts.collect();
            fb.gep(block, base, &indices)
        }
        "load" => {
            let (addr_str, ty_str) = args.split_once(':').ok_or_else(|| err(path, ln, "load requires `: TYPE`"))?;
            let addr = parse_value_ref(addr_str).ok_or_else(|| err(path, ln, "bad load address"))?;
            let ty = parse_type(ty_str.trim()).ok_or_else(|| err(path, ln, "bad load type"))?;
            fb.load(block, addr, ty)
        }
        "store" => {
            let (operands, ty_str) = args.split_once(':').ok_or_else(|| err(path, ln, "store requires `: TYPE`"))?;
            let mut parts = operands.split(',').filter_map(parse_value_ref);
            let addr = parts.next().ok_or_else(|| err(path, ln, "store requires an address"))?;
            let value = parts.next().ok_or_else(|| err(path, ln, "store requires a value"))?;
            let ty = parse_type(ty_str.trim()).ok_or_else(|| err(path, ln, "bad store type"))?;
            fb.store(block, addr, value, ty)
        }
        "binop" => {
            let mut parts = args.splitn(2, ' ');
            let kind = parts.next().ok_or_else(|| err(path, ln, "binop requires an operator"))?;
            let rest = parts.next().unwrap_or("");
            let mut operands = rest.split(',').filter_map(parse_value_ref);
            let lhs = operands.next().ok_or_else(|| err(path, ln, "binop requires lhs"))?;
            let rhs_v = operands.next().ok_or_else(|| err(path, ln, "binop requires rhs"))?;
            let op = parse_binop(kind).ok_or_else(|| err(path, ln, "bad binop operator"))?;
            fb.binop(block, op, lhs, rhs_v)
        }
        "cmp" => {
            let mut parts = args.splitn(2, ' ');
            let kind = parts.next().ok_or_else(|| err(path, ln, "cmp requires a predicate"))?;
            let rest = parts.next().unwrap_or("");
            let mut operands = rest.split(',').filter_map(parse_value_ref);
            let lhs = operands.next().ok_or_else(|| err(path, ln, "cmp requires lhs"))?;
            let rhs_v = operands.next().ok_or_else(|| err(path, ln, "cmp requires rhs"))?;
            let pred = parse_cmp_pred(kind).ok_or_else(|| err(path, ln, "bad cmp predicate"))?;
            fb.cmp(block, pred, lhs, rhs_v)
        }
        "call" => {
            let (callee, arg_list) = args.split_once('(').ok_or_else(|| err(path, ln, "call requires `name(args)`"))?;
            let arg_list = arg_list.trim_end_matches(')');
            let callee = callee.trim();
            let callee = if callee == "?" { None } else { Some(callee) };
            let args: Vec<ValueId> = arg_list.split(',').filter_map(parse_value_ref).collect();
            fb.call(block, callee, &args)
        }
        other => return Err(err(path, ln, format!("unknown instruction `{other}`"))),
    };

    if let Some(loc) = loc {
        fb.with_loc(id, loc);
    }
    let expected: usize = dst[1..].parse().map_err(|_| err(path, ln, "bad destination id"))?;
    if expected != id.0 {
        return Err(err(
            path,
            ln,
            format!("destination v{expected} does not match allocated id v{}", id.0),
        ));
    }
    Ok(())
}

fn parse_type(s: &str) -> Option<Type> {
    match s {
        "ptr" => Some(Type::Ptr(Box::new(Type::Other))),
        "double" => Some(Type::Double),
        "other" => Some(Type::Other),
        _ => {
            let bits = s.strip_prefix('i')?;
            bits.parse::<u32>().ok().map(Type::Int)
        }
    }
}

fn parse_binop(s: &str) -> Option<BinOp> {
    match s {
        "add" => Some(BinOp::Add),
        "sub" => Some(BinOp::Sub),
        "mul" => Some(BinOp::Mul),
        "shl" => Some(BinOp::Shl),
        "and" => Some(BinOp::And),
        "or" => Some(BinOp::Or),
        _ => None,
    }
}

fn parse_cmp_pred(s: &str) -> Option<CmpPred> {
    match s {
        "eq" => Some(CmpPred::Eq),
        "ne" => Some(CmpPred::Ne),
        "lt" => Some(CmpPred::Lt),
        "le" => Some(CmpPred::Le),
        "gt" => Some(CmpPred::Gt),
        "ge" => Some(CmpPred::Ge),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_straight_line_function() {
        let text = r#"
module: demo

function: main
block 0:
v0 = alloca
v1 = const_int 16
v2 = const_int 1
v3 = store v0, v1 : i32
br 0
endfunction
"#;
        let module = parse_module(text, "demo.ir").expect("should parse");
        assert_eq!(module.name, "demo");
        assert_eq!(module.functions.len(), 1);
        assert_eq!(module.functions[0].name, "main");
        assert_eq!(module.functions[0].blocks.len(), 1);
    }

    #[test]
    fn rejects_missing_module_header() {
        let err = parse_module("function: f\nendfunction\n", "bad.ir").unwrap_err();
        assert!(matches!(err, LoadError::Parse { .. }));
    }

    #[test]
    fn reports_io_error_for_missing_file() {
        let result = load_module(Path::new("/definitely/does/not/exist.ir"));
        assert!(matches!(result, Err(LoadError::Io { .. })));
    }
}
