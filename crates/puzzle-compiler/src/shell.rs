//! The precompiled first-flush shell.

use puzzle_core::RequestContext;

/// A request expression inside a `${…}` token.
///
/// The namespace is closed: only request fields resolve. Templates carry no
/// executable code; an expression outside the namespace renders empty.
#[derive(Debug, Clone, PartialEq)]
pub enum ShellExpr {
    /// `${req.path}`
    Path,
    /// `${req.query.<name>}`
    Query(String),
    /// `${req.params.<name>}`
    Param(String),
    /// `${req.headers.<name>}`
    Header(String),
    /// `${req.cookies.<name>}`
    Cookie(String),
    /// Anything else; renders empty.
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq)]
enum ShellPart {
    Literal(String),
    Expr(ShellExpr),
}

/// The shell compiled from the rewritten template.
///
/// Sentinel tokens survive compilation verbatim; only `${…}` tokens are
/// parsed. Rendering is pure in the request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledShell {
    parts: Vec<ShellPart>,
}

impl CompiledShell {
    /// Parse the serialized shell HTML.
    pub fn parse(html: &str) -> Self {
        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut rest = html;

        while let Some(start) = rest.find("${") {
            match rest[start + 2..].find('}') {
                Some(end) => {
                    literal.push_str(&rest[..start]);
                    if !literal.is_empty() {
                        parts.push(ShellPart::Literal(std::mem::take(&mut literal)));
                    }
                    let expr = &rest[start + 2..start + 2 + end];
                    parts.push(ShellPart::Expr(parse_expr(expr)));
                    rest = &rest[start + 2 + end + 1..];
                }
                None => break,
            }
        }

        literal.push_str(rest);
        if !literal.is_empty() {
            parts.push(ShellPart::Literal(literal));
        }

        Self { parts }
    }

    /// Render the first-flush string for a request, sentinels intact.
    pub fn render(&self, req: &RequestContext) -> String {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                ShellPart::Literal(literal) => out.push_str(literal),
                ShellPart::Expr(expr) => out.push_str(resolve(expr, req)),
            }
        }
        out
    }

    /// Whether the shell contains no request expressions.
    pub fn is_static(&self) -> bool {
        self.parts
            .iter()
            .all(|p| matches!(p, ShellPart::Literal(_)))
    }
}

fn parse_expr(expr: &str) -> ShellExpr {
    let expr = expr.trim();
    if expr == "req.path" {
        ShellExpr::Path
    } else if let Some(name) = expr.strip_prefix("req.query.") {
        ShellExpr::Query(name.to_string())
    } else if let Some(name) = expr.strip_prefix("req.params.") {
        ShellExpr::Param(name.to_string())
    } else if let Some(name) = expr.strip_prefix("req.headers.") {
        ShellExpr::Header(name.to_string())
    } else if let Some(name) = expr.strip_prefix("req.cookies.") {
        ShellExpr::Cookie(name.to_string())
    } else {
        ShellExpr::Unknown(expr.to_string())
    }
}

fn resolve<'a>(expr: &ShellExpr, req: &'a RequestContext) -> &'a str {
    match expr {
        ShellExpr::Path => &req.path,
        ShellExpr::Query(name) => req.query_param(name).unwrap_or(""),
        ShellExpr::Param(name) => req.param(name).unwrap_or(""),
        ShellExpr::Header(name) => req.header(name).unwrap_or(""),
        ShellExpr::Cookie(name) => req.cookie(name).unwrap_or(""),
        ShellExpr::Unknown(_) => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use puzzle_core::Method;

    fn make_request() -> RequestContext {
        RequestContext::new(Method::Get, "/products/42")
            .with_query("locale", "en-US")
            .with_header("x-device", "mobile")
            .with_cookie("session", "s1")
    }

    #[test]
    fn test_static_shell_passes_through() {
        let shell = CompiledShell::parse("<html><body>{fragment|f_g_main}</body></html>");
        assert!(shell.is_static());
        assert_eq!(
            shell.render(&make_request()),
            "<html><body>{fragment|f_g_main}</body></html>"
        );
    }

    #[test]
    fn test_request_expressions_resolve() {
        let shell = CompiledShell::parse(
            "<p>${req.path}|${req.query.locale}|${req.headers.x-device}|${req.cookies.session}</p>",
        );
        assert_eq!(
            shell.render(&make_request()),
            "<p>/products/42|en-US|mobile|s1</p>"
        );
    }

    #[test]
    fn test_unknown_expression_renders_empty() {
        let shell = CompiledShell::parse("<p>${window.alert(1)}</p>");
        assert_eq!(shell.render(&make_request()), "<p></p>");
    }

    #[test]
    fn test_missing_request_field_renders_empty() {
        let shell = CompiledShell::parse("<p>${req.query.absent}</p>");
        assert_eq!(shell.render(&make_request()), "<p></p>");
    }

    #[test]
    fn test_unterminated_token_is_literal() {
        let shell = CompiledShell::parse("<p>${req.path</p>");
        assert_eq!(shell.render(&make_request()), "<p>${req.path</p>");
    }

    #[test]
    fn test_render_is_idempotent() {
        let shell = CompiledShell::parse("<p>${req.path}</p>");
        let req = make_request();
        assert_eq!(shell.render(&req), shell.render(&req));
    }
}
