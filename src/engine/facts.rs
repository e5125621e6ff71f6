//! Class facts from Java sources.
//!
//! Receivers are inferred syntactically from declarations visible in the file:
//! locals, parameters, fields of the enclosing and outer types, static imports
//! and a few expression shapes. Nothing is resolved across files.

use anyhow::{Context, Result};
use camino::Utf8Path;
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use streaming_iterator::StreamingIterator;
use tracing::{debug, warn};
use tree_sitter::{Node, Query, QueryCursor};

use crate::engine::parser;
use crate::error::{ErrorCode, LensError};
use crate::models::fact::{
    CallFact, ClassFact, FactsResult, FieldFact, MethodFact, UNRESOLVED_RECEIVER, Visibility,
    DEFAULT_PACKAGE,
};

const IMPORT_QUERY: &str = "(import_declaration) @import";

const TYPE_DECLARATIONS: &[&str] = &[
    "class_declaration",
    "interface_declaration",
    "enum_declaration",
    "record_declaration",
    "annotation_type_declaration",
];

const METHOD_DECLARATIONS: &[&str] = &[
    "method_declaration",
    "constructor_declaration",
    "compact_constructor_declaration",
];

/// Nodes that open a new scope for local declarations.
const LOCAL_SCOPES: &[&str] = &[
    "block",
    "switch_block",
    "lambda_expression",
    "class_body",
    "for_statement",
    "enhanced_for_statement",
    "catch_clause",
    "try_with_resources_statement",
];

/// Facts extracted from one source file.
#[derive(Debug, Default)]
pub struct FileFacts {
    pub classes: Vec<ClassFact>,
    /// tree-sitter recovered from at least one syntax error
    pub has_errors: bool,
}

/// Accumulates facts for one analysis run.
#[derive(Debug, Default)]
pub struct FactCollector {
    classes: Vec<ClassFact>,
    files_scanned: usize,
    parse_errors: usize,
}

impl FactCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extract every file in parallel and append the results in file order.
    pub fn collect_files(&mut self, files: &[PathBuf]) -> Result<()> {
        let extracted: Vec<FileFacts> = files
            .par_iter()
            .map(|path| extract_file(path))
            .collect::<Result<_>>()?;

        for (path, file) in files.iter().zip(extracted) {
            if file.has_errors {
                warn!(path = %path.display(), "syntax errors, facts may be partial");
            }
            self.add(file);
        }
        debug!(
            files = self.files_scanned,
            classes = self.classes.len(),
            parse_errors = self.parse_errors,
            "facts collected"
        );
        Ok(())
    }

    pub fn add(&mut self, file: FileFacts) {
        self.files_scanned += 1;
        if file.has_errors {
            self.parse_errors += 1;
        }
        self.classes.extend(file.classes);
    }

    pub fn classes(&self) -> &[ClassFact] {
        &self.classes
    }

    pub fn finish(self) -> FactsResult {
        FactsResult {
            files_scanned: self.files_scanned,
            parse_errors: self.parse_errors,
            classes: self.classes,
        }
    }
}

pub fn extract_file(path: &Path) -> Result<FileFacts> {
    let utf8 = Utf8Path::from_path(path).ok_or_else(|| {
        LensError::new(
            ErrorCode::InvalidRequest,
            format!("Path is not valid UTF-8: {}", path.display()),
        )
    })?;
    let source = parser::read_file(utf8)?;
    extract_source(&source, utf8.as_str())
        .with_context(|| format!("Failed to extract facts from {utf8}"))
}

/// Extract facts from in-memory source. `path` is recorded on every fact.
pub fn extract_source(source: &[u8], path: &str) -> Result<FileFacts> {
    let tree = parser::parse_java(source, path)?;
    let root = tree.root_node();

    let file = FileContext {
        source,
        path,
        package: package_name(root, source),
        imports: ImportIndex::build(root, source)?,
    };

    let mut classes = Vec::new();
    let mut scopes = Vec::new();
    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        if TYPE_DECLARATIONS.contains(&child.kind()) {
            visit_type(child, &file, &mut scopes, &mut classes);
        }
    }

    Ok(FileFacts {
        classes,
        has_errors: root.has_error(),
    })
}

struct FileContext<'a> {
    source: &'a [u8],
    path: &'a str,
    package: String,
    imports: ImportIndex,
}

/// Static imports of one compilation unit.
#[derive(Debug, Default)]
struct ImportIndex {
    /// member name -> owning type, from `import static a.b.C.m;`
    members: HashMap<String, String>,
    /// owning types of `import static a.b.C.*;`
    wildcard_owners: Vec<String>,
}

impl ImportIndex {
    fn build(root: Node<'_>, source: &[u8]) -> Result<Self> {
        let language = parser::java_language();
        let query = Query::new(&language, IMPORT_QUERY)?;
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&query, root, source);

        let mut index = Self::default();
        while let Some(m) = matches.next() {
            for capture in m.captures {
                index.add(capture.node, source);
            }
        }
        Ok(index)
    }

    fn add(&mut self, import: Node<'_>, source: &[u8]) {
        let mut is_static = false;
        let mut is_wildcard = false;
        let mut path = None;

        let mut cursor = import.walk();
        for child in import.children(&mut cursor) {
            match child.kind() {
                "static" => is_static = true,
                "asterisk" => is_wildcard = true,
                "scoped_identifier" | "identifier" => path = Some(text(child, source)),
                _ => {}
            }
        }

        let (true, Some(path)) = (is_static, path) else {
            return;
        };
        if is_wildcard {
            let owner = last_segment(path).to_string();
            if !self.wildcard_owners.contains(&owner) {
                self.wildcard_owners.push(owner);
            }
        } else if let Some((owner, member)) = path.rsplit_once('.') {
            self.members
                .insert(member.to_string(), last_segment(owner).to_string());
        }
    }

    fn owner_of(&self, method: &str) -> Option<&str> {
        if let Some(owner) = self.members.get(method) {
            return Some(owner.as_str());
        }
        match self.wildcard_owners.as_slice() {
            [only] => Some(only.as_str()),
            _ => None,
        }
    }
}

/// Declarations of one enclosing type, visible to its methods and nested types.
#[derive(Debug)]
struct TypeScope {
    name: String,
    superclass: Option<String>,
    fields: HashMap<String, String>,
    methods: HashSet<String>,
}

/// Local variables of one method, innermost scope last.
#[derive(Debug)]
struct Locals {
    frames: Vec<HashMap<String, String>>,
}

impl Locals {
    fn new() -> Self {
        Self {
            frames: vec![HashMap::new()],
        }
    }

    fn push(&mut self) {
        self.frames.push(HashMap::new());
    }

    fn pop(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    fn insert(&mut self, name: String, type_name: String) {
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name, type_name);
        }
    }

    fn get(&self, name: &str) -> Option<&String> {
        self.frames.iter().rev().find_map(|f| f.get(name))
    }
}

fn visit_type(
    decl: Node<'_>,
    file: &FileContext<'_>,
    scopes: &mut Vec<TypeScope>,
    out: &mut Vec<ClassFact>,
) {
    let source = file.source;
    let Some(name) = decl.child_by_field_name("name").map(|n| text(n, source)) else {
        return;
    };

    let mut fact = ClassFact::new(name);
    fact.package = file.package.clone();
    fact.path = file.path.to_string();

    let superclass = decl
        .child_by_field_name("superclass")
        .and_then(|s| s.named_child(0))
        .map(|t| simple_type(t, source));
    fact.supertypes.extend(superclass.iter().cloned());
    let mut cursor = decl.walk();
    for child in decl.named_children(&mut cursor) {
        if matches!(child.kind(), "super_interfaces" | "extends_interfaces") {
            fact.supertypes.extend(listed_types(child, source));
        }
    }

    let default_visibility = match decl.kind() {
        "interface_declaration" | "annotation_type_declaration" => Visibility::Public,
        _ => Visibility::PackagePrivate,
    };

    let mut scope = TypeScope {
        name: name.to_string(),
        superclass,
        fields: HashMap::new(),
        methods: HashSet::new(),
    };

    // Record components behave as private final fields.
    if let Some(params) = decl.child_by_field_name("parameters") {
        let mut cursor = params.walk();
        for param in params.named_children(&mut cursor) {
            if let (Some(ty), Some(id)) = (
                param.child_by_field_name("type"),
                param.child_by_field_name("name"),
            ) {
                let field = FieldFact {
                    name: text(id, source).to_string(),
                    type_name: simple_type(ty, source),
                    visibility: Visibility::Private,
                };
                scope.fields.insert(field.name.clone(), field.type_name.clone());
                fact.fields.push(field);
            }
        }
    }

    let containers = member_containers(decl);
    // Methods of enum constant bodies belong to the enum itself.
    let constant_bodies = enum_constant_bodies(decl);

    for container in &containers {
        let mut cursor = container.walk();
        for member in container.named_children(&mut cursor) {
            match member.kind() {
                "field_declaration" | "constant_declaration" => {
                    let field_visibility = visibility(member, default_visibility);
                    for (field_name, type_name) in declared_variables(member, source) {
                        scope.fields.insert(field_name.clone(), type_name.clone());
                        fact.fields.push(FieldFact {
                            name: field_name,
                            type_name,
                            visibility: field_visibility,
                        });
                    }
                }
                "method_declaration" => {
                    if let Some(n) = member.child_by_field_name("name") {
                        scope.methods.insert(text(n, source).to_string());
                    }
                }
                _ => {}
            }
        }
    }
    for body in &constant_bodies {
        let mut cursor = body.walk();
        for member in body.named_children(&mut cursor) {
            if member.kind() == "method_declaration"
                && let Some(n) = member.child_by_field_name("name")
            {
                scope.methods.insert(text(n, source).to_string());
            }
        }
    }

    scopes.push(scope);
    let mut nested = Vec::new();
    for container in containers.iter().chain(&constant_bodies) {
        let mut cursor = container.walk();
        for member in container.named_children(&mut cursor) {
            let kind = member.kind();
            if METHOD_DECLARATIONS.contains(&kind) {
                fact.methods.push(method_fact(member, file, scopes));
            } else if TYPE_DECLARATIONS.contains(&kind) {
                visit_type(member, file, scopes, &mut nested);
            }
        }
    }
    scopes.pop();

    out.push(fact);
    out.extend(nested);
}

/// Nodes whose named children are the members of `decl`.
fn member_containers<'tree>(decl: Node<'tree>) -> Vec<Node<'tree>> {
    let Some(body) = decl.child_by_field_name("body") else {
        return Vec::new();
    };
    if body.kind() != "enum_body" {
        return vec![body];
    }
    let mut cursor = body.walk();
    let declarations: Vec<Node<'tree>> = body
        .named_children(&mut cursor)
        .filter(|c| c.kind() == "enum_body_declarations")
        .collect();
    declarations
}

/// `class_body` of each enum constant that has one.
fn enum_constant_bodies<'tree>(decl: Node<'tree>) -> Vec<Node<'tree>> {
    let Some(body) = decl.child_by_field_name("body").filter(|b| b.kind() == "enum_body") else {
        return Vec::new();
    };
    let mut cursor = body.walk();
    let bodies: Vec<Node<'tree>> = body
        .named_children(&mut cursor)
        .filter(|c| c.kind() == "enum_constant")
        .filter_map(|c| c.child_by_field_name("body"))
        .collect();
    bodies
}

fn method_fact(member: Node<'_>, file: &FileContext<'_>, scopes: &[TypeScope]) -> MethodFact {
    let source = file.source;
    let name = member
        .child_by_field_name("name")
        .map(|n| text(n, source).to_string())
        .unwrap_or_default();

    let mut locals = Locals::new();
    let params = member
        .child_by_field_name("parameters")
        .map(|p| declare_parameters(p, source, &mut locals))
        .unwrap_or(0);

    let body = member.child_by_field_name("body");
    let lines = body
        .map(|b| b.end_position().row - b.start_position().row + 1)
        .unwrap_or(0);
    let calls = body
        .map(|b| collect_calls(b, file, scopes, &mut locals))
        .unwrap_or_default();

    MethodFact {
        name,
        params,
        lines,
        calls,
    }
}

/// Register formal parameters and return how many there are.
fn declare_parameters(
    params: Node<'_>,
    source: &[u8],
    locals: &mut Locals,
) -> usize {
    let mut count = 0;
    let mut cursor = params.walk();
    for param in params.named_children(&mut cursor) {
        match param.kind() {
            "formal_parameter" => {
                count += 1;
                declare_single(param, source, locals);
            }
            "spread_parameter" => {
                count += 1;
                let element = param
                    .child_by_field_name("type")
                    .map(|t| simple_type(t, source));
                let mut inner = param.walk();
                let declarator = param
                    .named_children(&mut inner)
                    .find(|c| c.kind() == "variable_declarator");
                if let (Some(element), Some(id)) =
                    (element, declarator.and_then(|d| d.child_by_field_name("name")))
                {
                    locals.insert(text(id, source).to_string(), format!("{element}[]"));
                }
            }
            _ => {}
        }
    }
    count
}

/// Walk a body in source order, tracking local declarations as they appear.
///
/// Declarations go out of scope at the end of their block, loop, catch clause,
/// lambda or class body. Calls inside lambdas and anonymous or local classes
/// belong to the enclosing method.
fn collect_calls(
    body: Node<'_>,
    file: &FileContext<'_>,
    scopes: &[TypeScope],
    locals: &mut Locals,
) -> Vec<CallFact> {
    enum Step<'tree> {
        Enter(Node<'tree>),
        Leave,
    }

    let source = file.source;
    let mut calls = Vec::new();
    let mut stack = vec![Step::Enter(body)];

    while let Some(step) = stack.pop() {
        let node = match step {
            Step::Enter(node) => node,
            Step::Leave => {
                locals.pop();
                continue;
            }
        };

        if LOCAL_SCOPES.contains(&node.kind()) {
            locals.push();
            stack.push(Step::Leave);
        }

        match node.kind() {
            "local_variable_declaration" | "field_declaration" => {
                for (name, type_name) in declared_variables(node, source) {
                    locals.insert(name, type_name);
                }
            }
            "formal_parameter" | "catch_formal_parameter" | "enhanced_for_statement"
            | "resource" => declare_single(node, source, locals),
            "lambda_expression" => declare_lambda_parameters(node, source, locals),
            "method_invocation" => {
                if let Some(call) = resolve_call(node, file, scopes, locals) {
                    calls.push(call);
                }
            }
            _ => {}
        }

        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
        stack.extend(children.into_iter().rev().map(Step::Enter));
    }

    calls
}

/// `(name, simple type)` for each declarator of a field or local declaration.
fn declared_variables(decl: Node<'_>, source: &[u8]) -> Vec<(String, String)> {
    let Some(ty) = decl.child_by_field_name("type") else {
        return Vec::new();
    };
    let inferred = text(ty, source) == "var";

    let mut out = Vec::new();
    let mut cursor = decl.walk();
    for declarator in decl.children_by_field_name("declarator", &mut cursor) {
        let Some(id) = declarator.child_by_field_name("name") else {
            continue;
        };
        let type_name = if inferred {
            declarator
                .child_by_field_name("value")
                .and_then(|v| expression_type(v, source))
                .unwrap_or_else(|| UNRESOLVED_RECEIVER.to_string())
        } else {
            simple_type(ty, source)
        };
        out.push((text(id, source).to_string(), type_name));
    }
    out
}

/// Parameters, loop variables, catch parameters and resources.
fn declare_single(node: Node<'_>, source: &[u8], locals: &mut Locals) {
    let Some(id) = node.child_by_field_name("name") else {
        return;
    };
    let type_name = match node.child_by_field_name("type") {
        Some(ty) => simple_type(ty, source),
        None => {
            // catch (A | B e) has no single type
            let mut cursor = node.walk();
            node.named_children(&mut cursor)
                .find(|c| c.kind() == "catch_type")
                .filter(|c| c.named_child_count() == 1)
                .and_then(|c| c.named_child(0))
                .map(|t| simple_type(t, source))
                .unwrap_or_else(|| UNRESOLVED_RECEIVER.to_string())
        }
    };
    locals.insert(text(id, source).to_string(), type_name);
}

/// Lambda parameters have no declared type here; they only shadow.
fn declare_lambda_parameters(
    lambda: Node<'_>,
    source: &[u8],
    locals: &mut Locals,
) {
    let Some(params) = lambda.child_by_field_name("parameters") else {
        return;
    };
    match params.kind() {
        "identifier" => {
            locals.insert(text(params, source).to_string(), UNRESOLVED_RECEIVER.to_string());
        }
        "inferred_parameters" => {
            let mut cursor = params.walk();
            for id in params.named_children(&mut cursor) {
                locals.insert(text(id, source).to_string(), UNRESOLVED_RECEIVER.to_string());
            }
        }
        _ => {}
    }
}

fn resolve_call(
    invocation: Node<'_>,
    file: &FileContext<'_>,
    scopes: &[TypeScope],
    locals: &Locals,
) -> Option<CallFact> {
    let source = file.source;
    let name = invocation.child_by_field_name("name")?;
    let method = text(name, source);

    let receiver = match invocation.child_by_field_name("object") {
        None => unqualified_owner(method, file, scopes),
        Some(object) => receiver_type(object, source, scopes, locals),
    };

    Some(CallFact {
        method: method.to_string(),
        receiver,
        line: name.start_position().row,
    })
}

/// Declaring type in scope, then a static import, then the enclosing type.
fn unqualified_owner(method: &str, file: &FileContext<'_>, scopes: &[TypeScope]) -> String {
    if let Some(scope) = scopes.iter().rev().find(|s| s.methods.contains(method)) {
        return scope.name.clone();
    }
    if let Some(owner) = file.imports.owner_of(method) {
        return owner.to_string();
    }
    enclosing(scopes)
}

fn receiver_type(
    object: Node<'_>,
    source: &[u8],
    scopes: &[TypeScope],
    locals: &Locals,
) -> String {
    match object.kind() {
        "this" => enclosing(scopes),
        "super" => scopes
            .last()
            .and_then(|s| s.superclass.clone())
            .unwrap_or_else(|| enclosing(scopes)),
        "identifier" => {
            let name = text(object, source);
            if let Some(ty) = locals
                .get(name)
                .or_else(|| scopes.iter().rev().find_map(|s| s.fields.get(name)))
            {
                ty.clone()
            } else if name.chars().next().is_some_and(char::is_uppercase) {
                name.to_string()
            } else {
                UNRESOLVED_RECEIVER.to_string()
            }
        }
        "field_access" => {
            let on_this = object
                .child_by_field_name("object")
                .is_some_and(|o| o.kind() == "this");
            object
                .child_by_field_name("field")
                .filter(|_| on_this)
                .and_then(|f| scopes.last()?.fields.get(text(f, source)).cloned())
                .unwrap_or_else(|| UNRESOLVED_RECEIVER.to_string())
        }
        _ => expression_type(object, source).unwrap_or_else(|| UNRESOLVED_RECEIVER.to_string()),
    }
}

/// Static type of expressions whose type is spelled out in the syntax.
fn expression_type(expr: Node<'_>, source: &[u8]) -> Option<String> {
    match expr.kind() {
        "object_creation_expression" | "cast_expression" => expr
            .child_by_field_name("type")
            .map(|t| simple_type(t, source)),
        "parenthesized_expression" => expr
            .named_child(0)
            .and_then(|inner| expression_type(inner, source)),
        "string_literal" => Some("String".to_string()),
        _ => None,
    }
}

fn enclosing(scopes: &[TypeScope]) -> String {
    scopes
        .last()
        .map(|s| s.name.clone())
        .unwrap_or_else(|| UNRESOLVED_RECEIVER.to_string())
}

fn visibility(decl: Node<'_>, default: Visibility) -> Visibility {
    let mut cursor = decl.walk();
    let Some(modifiers) = decl
        .children(&mut cursor)
        .find(|c| c.kind() == "modifiers")
    else {
        return default;
    };

    let mut cursor = modifiers.walk();
    for modifier in modifiers.children(&mut cursor) {
        match modifier.kind() {
            "public" => return Visibility::Public,
            "protected" => return Visibility::Protected,
            "private" => return Visibility::Private,
            _ => {}
        }
    }
    default
}

/// Simple name of a type node: generics erased, packages dropped, arrays kept.
fn simple_type(node: Node<'_>, source: &[u8]) -> String {
    match node.kind() {
        "generic_type" => node
            .named_child(0)
            .map(|base| simple_type(base, source))
            .unwrap_or_else(|| erase(text(node, source))),
        "scoped_type_identifier" | "annotated_type" => {
            let mut cursor = node.walk();
            let last = node.named_children(&mut cursor).last();
            last.map(|n| simple_type(n, source))
                .unwrap_or_else(|| erase(text(node, source)))
        }
        "array_type" => {
            let element = node
                .child_by_field_name("element")
                .map(|e| simple_type(e, source))
                .unwrap_or_else(|| UNRESOLVED_RECEIVER.to_string());
            let dims = node
                .child_by_field_name("dimensions")
                .map(|d| text(d, source).matches('[').count())
                .unwrap_or(1)
                .max(1);
            format!("{element}{}", "[]".repeat(dims))
        }
        _ => erase(text(node, source)),
    }
}

fn listed_types(node: Node<'_>, source: &[u8]) -> Vec<String> {
    let mut out = Vec::new();
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() == "type_list" {
            out.extend(listed_types(child, source));
        } else {
            out.push(simple_type(child, source));
        }
    }
    out
}

fn package_name(root: Node<'_>, source: &[u8]) -> String {
    let mut cursor = root.walk();
    let package = root
        .named_children(&mut cursor)
        .find(|c| c.kind() == "package_declaration");
    let Some(package) = package else {
        return DEFAULT_PACKAGE.to_string();
    };

    let mut cursor = package.walk();
    let name = package
        .named_children(&mut cursor)
        .find(|c| matches!(c.kind(), "scoped_identifier" | "identifier"));
    name.map(|n| text(n, source).to_string())
        .unwrap_or_else(|| DEFAULT_PACKAGE.to_string())
}

fn erase(raw: &str) -> String {
    let base = raw.split('<').next().unwrap_or(raw);
    last_segment(base).trim().to_string()
}

fn last_segment(path: &str) -> &str {
    path.rsplit('.').next().unwrap_or(path)
}

fn text<'a>(node: Node<'_>, source: &'a [u8]) -> &'a str {
    node.utf8_text(source).unwrap_or("")
}
