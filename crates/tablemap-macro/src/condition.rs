use proc_macro2::{TokenStream, TokenTree};
use quote::{ToTokens, quote};
use syn::parse::{Parse, ParseStream};
use syn::{BinOp, Error, Expr, ExprClosure, Ident, Member, Pat, Result, UnOp};

/// `|param| body` or `|param: Type| body`.
pub struct ConditionClosure {
    pub body: Node,
}

impl Parse for ConditionClosure {
    fn parse(input: ParseStream) -> Result<Self> {
        let closure: ExprClosure = input.parse()?;

        if closure.inputs.len() != 1 {
            return Err(Error::new_spanned(&closure.inputs, "expected a closure with exactly one parameter"));
        }
        let param = match &closure.inputs[0] {
            Pat::Ident(pat) => pat.ident.clone(),
            Pat::Type(typed) => match typed.pat.as_ref() {
                Pat::Ident(pat) => pat.ident.clone(),
                other => return Err(Error::new_spanned(other, "expected a parameter name")),
            },
            other => return Err(Error::new_spanned(other, "expected a parameter name")),
        };

        Ok(Self {
            body: Node::from_expr(&closure.body, &param),
        })
    }
}

/// Boolean node, mirroring `tablemap::condition::Condition`.
pub enum Node {
    And(Box<Self>, Box<Self>),
    Or(Box<Self>, Box<Self>),
    Not(Box<Self>),
    Compare(Leaf, &'static str, Leaf),
    Property(String),
    Call(Leaf, &'static str, Leaf),
    Unsupported(String),
}

/// Operand, mirroring `tablemap::condition::Operand`.
pub enum Leaf {
    Property(String),
    Value(Expr),
    Values(Expr),
    Cast(Box<Self>),
    Unsupported(String),
}

fn shape(expr: &Expr) -> String {
    expr.to_token_stream().to_string()
}

fn unwrap_parens(mut expr: &Expr) -> &Expr {
    loop {
        match expr {
            Expr::Paren(inner) => expr = &inner.expr,
            Expr::Group(inner) => expr = &inner.expr,
            _ => return expr,
        }
    }
}

// `p.name` -> Some("name"); anything else (including `p.a.b`) -> None
fn property_name(expr: &Expr, param: &Ident) -> Option<String> {
    let Expr::Field(field) = unwrap_parens(expr) else { return None };
    let Expr::Path(base) = unwrap_parens(&field.base) else { return None };
    if !base.path.is_ident(param) {
        return None;
    }
    match &field.member {
        Member::Named(name) => Some(name.to_string()),
        Member::Unnamed(_) => None,
    }
}

fn mentions(tokens: TokenStream, param: &Ident) -> bool {
    tokens.into_iter().any(|tree| match tree {
        TokenTree::Ident(ident) => ident == *param,
        TokenTree::Group(group) => mentions(group.stream(), param),
        TokenTree::Punct(_) | TokenTree::Literal(_) => false,
    })
}

fn strip_reference(expr: &Expr) -> &Expr {
    match unwrap_parens(expr) {
        Expr::Reference(reference) => strip_reference(&reference.expr),
        other => other,
    }
}

impl Node {
    pub fn from_expr(expr: &Expr, param: &Ident) -> Self {
        let expr = unwrap_parens(expr);
        if let Some(property) = property_name(expr, param) {
            return Self::Property(property);
        }

        match expr {
            Expr::Binary(binary) => {
                let comparison = match binary.op {
                    BinOp::And(_) => {
                        return Self::And(
                            Box::new(Self::from_expr(&binary.left, param)),
                            Box::new(Self::from_expr(&binary.right, param)),
                        );
                    }
                    BinOp::Or(_) => {
                        return Self::Or(
                            Box::new(Self::from_expr(&binary.left, param)),
                            Box::new(Self::from_expr(&binary.right, param)),
                        );
                    }
                    BinOp::Eq(_) => "Eq",
                    BinOp::Ne(_) => "Ne",
                    BinOp::Gt(_) => "Gt",
                    BinOp::Ge(_) => "Ge",
                    BinOp::Lt(_) => "Lt",
                    BinOp::Le(_) => "Le",
                    _ => return Self::Unsupported(shape(expr)),
                };
                Self::Compare(
                    Leaf::from_expr(&binary.left, param),
                    comparison,
                    Leaf::from_expr(&binary.right, param),
                )
            }
            Expr::Unary(unary) if matches!(unary.op, UnOp::Not(_)) => {
                Self::Not(Box::new(Self::from_expr(&unary.expr, param)))
            }
            Expr::MethodCall(call) if call.args.len() == 1 => {
                let method = match call.method.to_string().as_str() {
                    "contains" => "Contains",
                    "starts_with" => "StartsWith",
                    "ends_with" => "EndsWith",
                    "eq" => "Equals",
                    _ => return Self::Unsupported(shape(expr)),
                };
                let target = if property_name(&call.receiver, param).is_some() {
                    Leaf::from_expr(&call.receiver, param)
                } else if method == "Contains" && !mentions(call.receiver.to_token_stream(), param) {
                    Leaf::Values(strip_reference(&call.receiver).clone())
                } else {
                    Leaf::from_expr(&call.receiver, param)
                };
                Self::Call(target, method, Leaf::from_expr(&call.args[0], param))
            }
            _ => Self::Unsupported(shape(expr)),
        }
    }

    fn tokens(&self) -> TokenStream {
        match self {
            Self::And(left, right) => {
                let (left, right) = (left.tokens(), right.tokens());
                quote!(::tablemap::condition::Condition::and(#left, #right))
            }
            Self::Or(left, right) => {
                let (left, right) = (left.tokens(), right.tokens());
                quote!(::tablemap::condition::Condition::or(#left, #right))
            }
            Self::Not(inner) => {
                let inner = inner.tokens();
                quote!(::tablemap::condition::Condition::not(#inner))
            }
            Self::Compare(left, op, right) => {
                let (left, right) = (left.tokens(), right.tokens());
                let op = Ident::new(op, proc_macro2::Span::call_site());
                quote!(::tablemap::condition::Condition::compare(
                    #left,
                    ::tablemap::condition::CompareOp::#op,
                    #right
                ))
            }
            Self::Property(name) => quote!(::tablemap::condition::Condition::property(#name)),
            Self::Call(target, method, argument) => {
                let (target, argument) = (target.tokens(), argument.tokens());
                let method = Ident::new(method, proc_macro2::Span::call_site());
                quote!(::tablemap::condition::Condition::call(
                    #target,
                    ::tablemap::condition::Method::#method,
                    #argument
                ))
            }
            Self::Unsupported(shape) => {
                quote!(::tablemap::condition::Condition::Unsupported(::std::string::String::from(#shape)))
            }
        }
    }
}

impl Leaf {
    pub fn from_expr(expr: &Expr, param: &Ident) -> Self {
        let expr = strip_reference(expr);
        if let Some(property) = property_name(expr, param) {
            return Self::Property(property);
        }
        match expr {
            Expr::Cast(cast) => Self::Cast(Box::new(Self::from_expr(&cast.expr, param))),
            _ if mentions(expr.to_token_stream(), param) => Self::Unsupported(shape(expr)),
            _ => Self::Value(expr.clone()),
        }
    }

    fn tokens(&self) -> TokenStream {
        match self {
            Self::Property(name) => quote!(::tablemap::condition::Operand::property(#name)),
            Self::Value(expr) => quote!(::tablemap::condition::Operand::value(::core::clone::Clone::clone(&(#expr)))),
            Self::Values(expr) => quote!(::tablemap::condition::Operand::values(
                ::core::iter::Iterator::cloned(::core::iter::IntoIterator::into_iter(&(#expr)))
            )),
            Self::Cast(inner) => {
                let inner = inner.tokens();
                quote!(::tablemap::condition::Operand::cast(#inner))
            }
            Self::Unsupported(shape) => {
                quote!(::tablemap::condition::Operand::Unsupported(::std::string::String::from(#shape)))
            }
        }
    }
}

pub fn expand(closure: &ConditionClosure) -> TokenStream {
    closure.body.tokens()
}
