// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A WGSL reflection front-end.
//!
//! This is not a WGSL compiler. It scans the module-level structure of a
//! WGSL source (structs, resource variables, functions, entry points) far
//! enough to describe each entry point's interface: its located inputs and
//! outputs, and the resource bindings reachable from its body. Function
//! bodies are only searched for identifiers.

use lyra_core::renderer::api::command::BufferBindingType;
use lyra_core::renderer::api::core::{
    ReflectedBinding, ReflectedBindingType, ShaderInterfaceVariable, ShaderReflection,
};
use lyra_core::renderer::api::pipeline::ScalarKind;
use lyra_core::renderer::api::resource::TextureViewDimension;
use lyra_core::renderer::api::util::{ShaderStage, TextureSampleKind};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// The interface of one entry point of a WGSL module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoint {
    /// The function name.
    pub name: String,
    /// The stage its attribute declares.
    pub stage: ShaderStage,
    /// Inputs, outputs and reachable bindings.
    pub reflection: ShaderReflection,
}

/// A scanning failure, located by source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanError {
    /// 1-based line number.
    pub line: usize,
    /// What went wrong.
    pub message: String,
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for ScanError {}

/// Scans a WGSL module and describes every entry point, in source order.
///
/// ## Errors
/// * Unterminated block comments, unbalanced delimiters, declarations the
///   scanner cannot follow, and modules without any entry point.
pub fn scan(source: &str) -> Result<Vec<EntryPoint>, ScanError> {
    let stripped = strip_comments(source)?;
    let tokens = tokenize(&stripped);
    check_delimiters(&tokens)?;

    let module = Parser::new(&tokens).module()?;
    let entry_points = module.entry_points()?;
    if entry_points.is_empty() {
        return Err(ScanError {
            line: source.lines().count().max(1),
            message: "the module declares no @vertex, @fragment or @compute entry point".to_string(),
        });
    }
    Ok(entry_points)
}

/// Replaces comments with blanks, keeping newlines so line numbers survive.
fn strip_comments(source: &str) -> Result<String, ScanError> {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    let mut line = 1;

    while let Some(c) = chars.next() {
        match (c, chars.peek().copied()) {
            ('/', Some('/')) => {
                while let Some(&next) = chars.peek() {
                    if next == '\n' {
                        break;
                    }
                    chars.next();
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let opened_at = line;
                let mut depth = 1;
                while depth > 0 {
                    match chars.next() {
                        Some('\n') => {
                            line += 1;
                            out.push('\n');
                        }
                        Some('*') if chars.peek() == Some(&'/') => {
                            chars.next();
                            depth -= 1;
                        }
                        Some('/') if chars.peek() == Some(&'*') => {
                            chars.next();
                            depth += 1;
                        }
                        Some(_) => {}
                        None => {
                            return Err(ScanError {
                                line: opened_at,
                                message: "unterminated block comment".to_string(),
                            })
                        }
                    }
                }
                out.push(' ');
            }
            ('\n', _) => {
                line += 1;
                out.push('\n');
            }
            _ => out.push(c),
        }
    }
    Ok(out)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Token<'s> {
    text: &'s str,
    line: usize,
}

impl Token<'_> {
    fn is_ident(&self) -> bool {
        self.text
            .chars()
            .next()
            .is_some_and(|c| c.is_alphabetic() || c == '_')
    }
}

fn tokenize(source: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut line = 1;
    let mut chars = source.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        if c == '\n' {
            line += 1;
            continue;
        }
        if c.is_whitespace() {
            continue;
        }
        let mut end = start + c.len_utf8();
        if c.is_alphanumeric() || c == '_' {
            // Identifiers and numeric literals (`1.5f`, `0x1Fu`).
            let numeric = c.is_ascii_digit();
            while let Some(&(i, next)) = chars.peek() {
                if next.is_alphanumeric() || next == '_' || (numeric && next == '.') {
                    end = i + next.len_utf8();
                    chars.next();
                } else {
                    break;
                }
            }
        } else if c == '-' && chars.peek().is_some_and(|&(_, next)| next == '>') {
            chars.next();
            end += 1;
        }
        tokens.push(Token {
            text: &source[start..end],
            line,
        });
    }
    tokens
}

fn check_delimiters(tokens: &[Token<'_>]) -> Result<(), ScanError> {
    let mut open: Vec<Token<'_>> = Vec::new();
    for token in tokens {
        let expected = match token.text {
            "(" | "[" | "{" => {
                open.push(*token);
                continue;
            }
            ")" => "(",
            "]" => "[",
            "}" => "{",
            _ => continue,
        };
        match open.pop() {
            Some(opener) if opener.text == expected => {}
            Some(opener) => {
                return Err(ScanError {
                    line: token.line,
                    message: format!(
                        "'{}' opened at line {} is closed by '{}'",
                        opener.text, opener.line, token.text
                    ),
                })
            }
            None => {
                return Err(ScanError {
                    line: token.line,
                    message: format!("unexpected '{}'", token.text),
                })
            }
        }
    }
    match open.pop() {
        Some(opener) => Err(ScanError {
            line: opener.line,
            message: format!("'{}' is never closed", opener.text),
        }),
        None => Ok(()),
    }
}

#[derive(Debug, Clone)]
struct Attribute<'s> {
    name: &'s str,
    args: Vec<&'s str>,
    line: usize,
}

trait AttributeList {
    fn find(&self, name: &str) -> Option<&Attribute<'_>>;
    fn number(&self, name: &str) -> Result<Option<u32>, ScanError>;
}

impl AttributeList for [Attribute<'_>] {
    fn find(&self, name: &str) -> Option<&Attribute<'_>> {
        self.iter().find(|a| a.name == name)
    }

    fn number(&self, name: &str) -> Result<Option<u32>, ScanError> {
        let Some(attribute) = self.iter().find(|a| a.name == name) else {
            return Ok(None);
        };
        let raw = attribute.args.first().copied().unwrap_or_default();
        parse_integer(raw).map(Some).ok_or_else(|| ScanError {
            line: attribute.line,
            message: format!("@{name} expects an integer literal, found '{raw}'"),
        })
    }
}

fn parse_integer(raw: &str) -> Option<u32> {
    let digits = raw.trim_end_matches(['u', 'i']);
    match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => digits.parse().ok(),
    }
}

#[derive(Debug, Clone)]
struct Member<'s> {
    attributes: Vec<Attribute<'s>>,
    name: &'s str,
    ty: String,
    line: usize,
}

#[derive(Debug, Clone)]
struct Resource {
    group: u32,
    binding: u32,
    ty: ReflectedBindingType,
}

#[derive(Debug, Clone)]
struct Function<'s> {
    attributes: Vec<Attribute<'s>>,
    name: &'s str,
    params: Vec<Member<'s>>,
    output: Option<(Vec<Attribute<'s>>, String)>,
    body: std::ops::Range<usize>,
    line: usize,
}

#[derive(Debug, Default)]
struct Module<'t, 's> {
    tokens: &'t [Token<'s>],
    structs: HashMap<&'s str, Vec<Member<'s>>>,
    resources: HashMap<&'s str, Resource>,
    functions: Vec<Function<'s>>,
}

struct Parser<'t, 's> {
    tokens: &'t [Token<'s>],
    pos: usize,
}

impl<'t, 's> Parser<'t, 's> {
    fn new(tokens: &'t [Token<'s>]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<Token<'s>> {
        self.tokens.get(self.pos).copied()
    }

    fn line(&self) -> usize {
        self.peek()
            .or_else(|| self.tokens.last().copied())
            .map_or(1, |t| t.line)
    }

    fn error(&self, message: impl Into<String>) -> ScanError {
        ScanError {
            line: self.line(),
            message: message.into(),
        }
    }

    fn eat(&mut self, text: &str) -> bool {
        if self.peek().is_some_and(|t| t.text == text) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, text: &str) -> Result<Token<'s>, ScanError> {
        match self.peek() {
            Some(token) if token.text == text => {
                self.pos += 1;
                Ok(token)
            }
            Some(token) => Err(self.error(format!("expected '{text}', found '{}'", token.text))),
            None => Err(self.error(format!("expected '{text}', found the end of the module"))),
        }
    }

    fn ident(&mut self) -> Result<&'s str, ScanError> {
        match self.peek() {
            Some(token) if token.is_ident() => {
                self.pos += 1;
                Ok(token.text)
            }
            Some(token) => Err(self.error(format!("expected a name, found '{}'", token.text))),
            None => Err(self.error("expected a name, found the end of the module")),
        }
    }

    /// Skips a delimited group starting at the current token and returns the
    /// range of tokens between the delimiters. Balance was checked up front.
    fn group(&mut self) -> std::ops::Range<usize> {
        let start = self.pos + 1;
        let mut depth = 0usize;
        while let Some(token) = self.peek() {
            self.pos += 1;
            match token.text {
                "(" | "[" | "{" => depth += 1,
                ")" | "]" | "}" => {
                    depth -= 1;
                    if depth == 0 {
                        return start..self.pos - 1;
                    }
                }
                _ => {}
            }
        }
        start..self.pos
    }

    /// Skips to the end of a `;`-terminated declaration.
    fn skip_declaration(&mut self) {
        while let Some(token) = self.peek() {
            match token.text {
                ";" => {
                    self.pos += 1;
                    return;
                }
                "(" | "[" | "{" => {
                    self.group();
                }
                _ => self.pos += 1,
            }
        }
    }

    fn attributes(&mut self) -> Result<Vec<Attribute<'s>>, ScanError> {
        let mut attributes = Vec::new();
        while self.eat("@") {
            let line = self.line();
            let name = self.ident()?;
            let mut args = Vec::new();
            if self.peek().is_some_and(|t| t.text == "(") {
                let range = self.group();
                args = self.tokens[range]
                    .iter()
                    .filter(|t| t.text != ",")
                    .map(|t| t.text)
                    .collect();
            }
            attributes.push(Attribute { name, args, line });
        }
        Ok(attributes)
    }

    /// Reads a type until one of `terminators` appears outside angle brackets.
    fn type_until(&mut self, terminators: &[&str]) -> Result<String, ScanError> {
        let mut ty = String::new();
        let mut depth = 0usize;
        while let Some(token) = self.peek() {
            if depth == 0 && terminators.contains(&token.text) {
                break;
            }
            match token.text {
                "<" => depth += 1,
                ">" => depth = depth.saturating_sub(1),
                _ => {}
            }
            ty.push_str(token.text);
            self.pos += 1;
        }
        if ty.is_empty() {
            return Err(self.error("expected a type"));
        }
        Ok(ty)
    }

    fn member(&mut self, terminators: &[&str]) -> Result<Member<'s>, ScanError> {
        let attributes = self.attributes()?;
        let line = self.line();
        let name = self.ident()?;
        self.expect(":")?;
        let ty = self.type_until(terminators)?;
        Ok(Member {
            attributes,
            name,
            ty,
            line,
        })
    }

    fn members(&mut self, close: &str) -> Result<Vec<Member<'s>>, ScanError> {
        let mut members = Vec::new();
        while !self.eat(close) {
            members.push(self.member(&[",", close])?);
            self.eat(",");
        }
        Ok(members)
    }

    fn module(mut self) -> Result<Module<'t, 's>, ScanError> {
        let mut module = Module {
            tokens: self.tokens,
            ..Default::default()
        };

        while self.peek().is_some() {
            let attributes = self.attributes()?;
            let Some(keyword) = self.peek() else {
                return Err(self.error("attributes are not followed by a declaration"));
            };
            match keyword.text {
                "struct" => {
                    self.pos += 1;
                    let name = self.ident()?;
                    self.expect("{")?;
                    let members = self.members("}")?;
                    self.eat(";");
                    module.structs.insert(name, members);
                }
                "var" => {
                    self.pos += 1;
                    let mut space = Vec::new();
                    if self.eat("<") {
                        while !self.eat(">") {
                            let token = self.ident()?;
                            space.push(token);
                            self.eat(",");
                        }
                    }
                    let name = self.ident()?;
                    let ty = if self.eat(":") {
                        self.type_until(&[";", "="])?
                    } else {
                        String::new()
                    };
                    self.skip_declaration();

                    let group = attributes.number("group")?;
                    let binding = attributes.number("binding")?;
                    match (group, binding) {
                        (Some(group), Some(binding)) => {
                            let ty = binding_type(&space, &ty).ok_or_else(|| ScanError {
                                line: keyword.line,
                                message: format!("'{name}' has unsupported resource type '{ty}'"),
                            })?;
                            module.resources.insert(name, Resource { group, binding, ty });
                        }
                        (None, None) => {}
                        _ => {
                            return Err(ScanError {
                                line: keyword.line,
                                message: format!("'{name}' needs both @group and @binding"),
                            })
                        }
                    }
                }
                "fn" => {
                    self.pos += 1;
                    let name = self.ident()?;
                    self.expect("(")?;
                    let params = self.members(")")?;
                    let output = if self.eat("->") {
                        let attributes = self.attributes()?;
                        Some((attributes, self.type_until(&["{"])?))
                    } else {
                        None
                    };
                    if self.peek().map(|t| t.text) != Some("{") {
                        return Err(self.error(format!("expected the body of '{name}'")));
                    }
                    let body = self.group();
                    module.functions.push(Function {
                        attributes,
                        name,
                        params,
                        output,
                        body,
                        line: keyword.line,
                    });
                }
                "const" | "override" | "alias" | "enable" | "requires" | "diagnostic"
                | "const_assert" | "let" => self.skip_declaration(),
                ";" => self.pos += 1,
                other => return Err(self.error(format!("unexpected '{other}' at module scope"))),
            }
        }
        Ok(module)
    }
}

impl<'s> Module<'_, 's> {
    fn entry_points(&self) -> Result<Vec<EntryPoint>, ScanError> {
        let mut entry_points = Vec::new();
        for function in &self.functions {
            let stage = if function.attributes.find("vertex").is_some() {
                ShaderStage::Vertex
            } else if function.attributes.find("fragment").is_some() {
                ShaderStage::Fragment
            } else if function.attributes.find("compute").is_some() {
                ShaderStage::Compute
            } else {
                continue;
            };

            let mut inputs = Vec::new();
            for param in &function.params {
                self.interface(&param.attributes, &param.ty, &mut inputs)
                    .map_err(|message| ScanError {
                        line: param.line,
                        message: format!("parameter '{}' of '{}': {message}", param.name, function.name),
                    })?;
            }
            let mut outputs = Vec::new();
            if let Some((attributes, ty)) = &function.output {
                self.interface(attributes, ty, &mut outputs)
                    .map_err(|message| ScanError {
                        line: function.line,
                        message: format!("result of '{}': {message}", function.name),
                    })?;
            }
            inputs.sort_by_key(|v| v.location);
            outputs.sort_by_key(|v| v.location);

            let mut bindings: Vec<ReflectedBinding> =
                self.reachable_bindings(function).into_iter().collect();
            bindings.sort_by_key(|b| (b.group, b.binding));

            entry_points.push(EntryPoint {
                name: function.name.to_string(),
                stage,
                reflection: ShaderReflection {
                    inputs,
                    outputs,
                    bindings,
                },
            });
        }
        Ok(entry_points)
    }

    /// Collects the located values of a parameter or result, expanding structs.
    fn interface(
        &self,
        attributes: &[Attribute<'_>],
        ty: &str,
        out: &mut Vec<ShaderInterfaceVariable>,
    ) -> Result<(), String> {
        if attributes.find("builtin").is_some() {
            return Ok(());
        }
        let location = attributes.number("location").map_err(|e| e.message)?;
        if let Some(location) = location {
            let (kind, components) =
                interface_type(ty).ok_or_else(|| format!("'{ty}' cannot cross a stage boundary"))?;
            push_unique(out, ShaderInterfaceVariable { location, kind, components })?;
            return Ok(());
        }
        let members = self
            .structs
            .get(ty)
            .ok_or_else(|| format!("'{ty}' has neither @location nor @builtin"))?;
        for member in members {
            if member.attributes.find("builtin").is_some() {
                continue;
            }
            let location = member
                .attributes
                .number("location")
                .map_err(|e| e.message)?
                .ok_or_else(|| {
                    format!(
                        "member '{}' of '{ty}' (line {}) has neither @location nor @builtin",
                        member.name, member.line
                    )
                })?;
            let (kind, components) = interface_type(&member.ty)
                .ok_or_else(|| format!("'{}' cannot cross a stage boundary", member.ty))?;
            push_unique(out, ShaderInterfaceVariable { location, kind, components })?;
        }
        Ok(())
    }

    /// Every resource named in `entry`'s body or in a function it calls.
    fn reachable_bindings(&self, entry: &Function<'s>) -> HashSet<ReflectedBinding> {
        let by_name: HashMap<&str, &Function<'s>> =
            self.functions.iter().map(|f| (f.name, f)).collect();
        let mut visited: HashSet<&str> = HashSet::new();
        let mut pending = vec![entry];
        let mut bindings = HashSet::new();

        while let Some(function) = pending.pop() {
            if !visited.insert(function.name) {
                continue;
            }
            let body = &self.tokens[function.body.clone()];
            for (i, token) in body.iter().enumerate() {
                if !token.is_ident() {
                    continue;
                }
                // `a.name` is a member access, not a reference.
                if i > 0 && body[i - 1].text == "." {
                    continue;
                }
                if let Some(resource) = self.resources.get(token.text) {
                    bindings.insert(ReflectedBinding {
                        group: resource.group,
                        binding: resource.binding,
                        ty: resource.ty,
                    });
                } else if let Some(callee) = by_name.get(token.text) {
                    pending.push(*callee);
                }
            }
        }
        bindings
    }
}

fn push_unique(out: &mut Vec<ShaderInterfaceVariable>, variable: ShaderInterfaceVariable) -> Result<(), String> {
    if out.iter().any(|v| v.location == variable.location) {
        return Err(format!("@location({}) is used twice", variable.location));
    }
    out.push(variable);
    Ok(())
}

fn scalar(name: &str) -> Option<ScalarKind> {
    match name {
        "f32" | "f16" | "f" | "h" => Some(ScalarKind::Float),
        "i32" | "i" => Some(ScalarKind::Sint),
        "u32" | "u" => Some(ScalarKind::Uint),
        _ => None,
    }
}

/// The scalar kind and component count of a stage-boundary type.
fn interface_type(ty: &str) -> Option<(ScalarKind, u32)> {
    if let Some(kind) = scalar(ty) {
        if ty.len() > 1 {
            return Some((kind, 1));
        }
        return None;
    }
    let rest = ty.strip_prefix("vec")?;
    let components: u32 = rest.get(..1)?.parse().ok()?;
    if !(2..=4).contains(&components) {
        return None;
    }
    let element = &rest[1..];
    let element = match element.strip_prefix('<') {
        Some(generic) => generic.strip_suffix('>')?,
        None => element,
    };
    Some((scalar(element)?, components))
}

/// The binding type of a `@group @binding` variable.
fn binding_type(space: &[&str], ty: &str) -> Option<ReflectedBindingType> {
    match space.first().copied() {
        Some("uniform") => return Some(ReflectedBindingType::Buffer(BufferBindingType::Uniform)),
        Some("storage") => {
            return Some(ReflectedBindingType::Buffer(BufferBindingType::Storage {
                read_only: !space.contains(&"read_write"),
            }))
        }
        Some(_) => return None,
        None => {}
    }

    let (base, generic) = match ty.split_once('<') {
        Some((base, generic)) => (base, generic.strip_suffix('>')?),
        None => (ty, ""),
    };
    match base {
        "sampler" => return Some(ReflectedBindingType::Sampler { comparison: false }),
        "sampler_comparison" => return Some(ReflectedBindingType::Sampler { comparison: true }),
        _ => {}
    }

    let (depth, name) = match base.strip_prefix("texture_depth_") {
        Some(name) => (true, name),
        None => (false, base.strip_prefix("texture_")?),
    };
    let (multisampled, dimension) = match name {
        "1d" => (false, TextureViewDimension::D1),
        "2d" => (false, TextureViewDimension::D2),
        "2d_array" => (false, TextureViewDimension::D2Array),
        "3d" => (false, TextureViewDimension::D3),
        "cube" => (false, TextureViewDimension::Cube),
        "cube_array" => (false, TextureViewDimension::CubeArray),
        "multisampled_2d" => (true, TextureViewDimension::D2),
        _ => return None,
    };
    let sample_kind = if depth {
        TextureSampleKind::Depth
    } else {
        match scalar(generic)? {
            ScalarKind::Float => TextureSampleKind::Float,
            ScalarKind::Sint => TextureSampleKind::Sint,
            ScalarKind::Uint => TextureSampleKind::Uint,
        }
    };
    Some(ReflectedBindingType::Texture {
        sample_kind,
        dimension,
        multisampled,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRIANGLE: &str = r#"
// A colored triangle.
struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) color: vec4<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) color: vec4<f32>,
};

/* The transform.
   /* nested */ still a comment */
@group(0) @binding(0) var<uniform> transform: mat4x4<f32>;
@group(0) @binding(1) var albedo: texture_2d<f32>;
@group(0) @binding(2) var albedo_sampler: sampler;

fn shade(color: vec4<f32>, uv: vec2<f32>) -> vec4<f32> {
    return color * textureSample(albedo, albedo_sampler, uv);
}

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = transform * vec4<f32>(in.position, 1.0);
    out.color = in.color;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return shade(in.color, in.clip_position.xy);
}
"#;

    #[test]
    fn entry_points_are_found_in_order() {
        let entries = scan(TRIANGLE).unwrap();
        let names: Vec<_> = entries.iter().map(|e| (e.name.as_str(), e.stage)).collect();
        assert_eq!(
            names,
            [("vs_main", ShaderStage::Vertex), ("fs_main", ShaderStage::Fragment)]
        );
    }

    #[test]
    fn struct_parameters_expand_to_located_inputs() {
        let entries = scan(TRIANGLE).unwrap();
        let vertex = &entries[0].reflection;
        assert_eq!(
            vertex.inputs,
            [
                ShaderInterfaceVariable { location: 0, kind: ScalarKind::Float, components: 3 },
                ShaderInterfaceVariable { location: 1, kind: ScalarKind::Float, components: 4 },
            ]
        );
        // The builtin position is not a varying.
        assert_eq!(vertex.outputs.len(), 1);

        let fragment = &entries[1].reflection;
        assert_eq!(
            fragment.outputs,
            [ShaderInterfaceVariable { location: 0, kind: ScalarKind::Float, components: 4 }]
        );
    }

    #[test]
    fn bindings_follow_calls_from_the_entry_point() {
        let entries = scan(TRIANGLE).unwrap();
        let vertex: Vec<_> = entries[0].reflection.bindings.iter().map(|b| b.binding).collect();
        assert_eq!(vertex, [0]);
        let fragment = &entries[1].reflection.bindings;
        assert_eq!(fragment.len(), 2);
        assert_eq!(
            fragment[0].ty,
            ReflectedBindingType::Texture {
                sample_kind: TextureSampleKind::Float,
                dimension: TextureViewDimension::D2,
                multisampled: false,
            }
        );
        assert_eq!(fragment[1].ty, ReflectedBindingType::Sampler { comparison: false });
    }

    #[test]
    fn unbalanced_braces_report_their_line() {
        let source = "@vertex\nfn main() -> @builtin(position) vec4<f32> {\n    return vec4<f32>(0.0);\n";
        let err = scan(source).unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.message.contains("never closed"), "{err}");
    }

    #[test]
    fn mismatched_closer_is_reported() {
        let err = scan("fn f() {\n  let a = (1;\n}\n").unwrap_err();
        assert_eq!(err.line, 3);
        assert!(err.message.contains("closed by '}'"), "{err}");
    }

    #[test]
    fn module_without_entry_point_is_rejected() {
        let err = scan("fn helper() -> f32 {\n    return 1.0;\n}\n").unwrap_err();
        assert!(err.message.contains("no @vertex"), "{err}");
    }

    #[test]
    fn unterminated_comment_is_rejected() {
        let err = scan("@vertex fn main() {}\n/* open\n").unwrap_err();
        assert_eq!(err.line, 2);
    }

    #[test]
    fn storage_access_modes_and_integer_types() {
        let source = r#"
@group(1) @binding(0) var<storage, read> items: array<u32>;
@group(1) @binding(1) var<storage, read_write> totals: array<u32, 4>;
@group(1) @binding(2) var depth_map: texture_depth_2d;
@group(1) @binding(3) var shadow: sampler_comparison;

@fragment
fn main(@location(2) id: vec2u, @builtin(position) p: vec4f) -> @location(0) vec4<u32> {
    totals[0] = items[id.x];
    let d = textureSampleCompare(depth_map, shadow, vec2<f32>(0.0), 0.5);
    return vec4<u32>(id, 0u, 1u);
}
"#;
        let entries = scan(source).unwrap();
        let reflection = &entries[0].reflection;
        assert_eq!(
            reflection.inputs,
            [ShaderInterfaceVariable { location: 2, kind: ScalarKind::Uint, components: 2 }]
        );
        assert_eq!(reflection.outputs[0].kind, ScalarKind::Uint);
        let types: Vec<_> = reflection.bindings.iter().map(|b| b.ty).collect();
        assert_eq!(
            types,
            [
                ReflectedBindingType::Buffer(BufferBindingType::Storage { read_only: true }),
                ReflectedBindingType::Buffer(BufferBindingType::Storage { read_only: false }),
                ReflectedBindingType::Texture {
                    sample_kind: TextureSampleKind::Depth,
                    dimension: TextureViewDimension::D2,
                    multisampled: false,
                },
                ReflectedBindingType::Sampler { comparison: true },
            ]
        );
    }

    #[test]
    fn unlocated_parameters_are_rejected() {
        let err = scan("@fragment\nfn main(\n  color: vec4<f32>) -> @location(0) vec4<f32> { return color; }\n")
            .unwrap_err();
        assert_eq!(err.line, 3);
        assert!(err.message.contains("'color'"), "{err}");
    }
}
