use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields, GenericArgument, Ident, PathArguments, Type};

/// Derives `new(..)` plus a wrapping `expr(..) -> Expr` constructor for an
/// expression node, un-boxing `Box<T>` fields so call sites pass plain values.
#[proc_macro_derive(ExpressionType)]
pub fn derive_expression_type(input: TokenStream) -> TokenStream {
    derive_node_type(input, "Expr", "expr")
}

/// Same as `ExpressionType`, but wraps into `Stmt` via a `stmt(..)` constructor.
#[proc_macro_derive(StatementType)]
pub fn derive_statement_type(input: TokenStream) -> TokenStream {
    derive_node_type(input, "Stmt", "stmt")
}

fn derive_node_type(input: TokenStream, enum_name: &str, ctor_name: &str) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = input.ident;
    let enum_ident = Ident::new(enum_name, name.span());
    let ctor_ident = Ident::new(ctor_name, name.span());

    // Extract field names for constructor
    let fields = match &input.data {
        Data::Struct(data) => &data.fields,
        _ => panic!("node types can only be derived for structs"),
    };

    // Get fields and their types
    let field_info: Vec<(Ident, Type)> = match fields {
        Fields::Named(fields) => fields
            .named
            .iter()
            .map(|f| {
                let name = f.ident.clone().unwrap();
                let ty = f.ty.clone();
                (name, ty)
            })
            .collect::<Vec<_>>(),
        _ => panic!("node types require named fields"),
    };
    let field_names: Vec<_> = field_info.iter().map(|(name, _)| name).collect();

    let (param_types, field_assigns): (Vec<_>, Vec<_>) =
        field_info.iter().map(|(name, ty)| ctor_field(name, ty)).unzip();

    let expanded = quote! {
        impl #name {
            pub fn #ctor_ident(#(#field_names: #param_types),*) -> #enum_ident {
                #enum_ident::#name(Self::new(#(#field_names),*))
            }

            pub fn new(#(#field_names: #param_types),*) -> Self {
                Self {
                    #(#field_assigns),*
                }
            }
        }
    };

    TokenStream::from(expanded)
}

/// Constructor parameter type and field assignment for one struct field.
/// `Box<T>` fields take a `T` and re-box; `Option<Box<T>>` take an `Option<T>`.
fn ctor_field(name: &Ident, ty: &Type) -> (proc_macro2::TokenStream, proc_macro2::TokenStream) {
    if let Some(inner) = generic_inner(ty, "Box") {
        return (quote! { #inner }, quote! { #name: Box::new(#name) });
    }
    if let Some(opt_inner) = generic_inner(ty, "Option") {
        if let Some(inner) = generic_inner(opt_inner, "Box") {
            return (quote! { Option<#inner> }, quote! { #name: #name.map(Box::new) });
        }
    }
    (quote! { #ty }, quote! { #name })
}

fn generic_inner<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    if let Type::Path(type_path) = ty {
        let segment = type_path.path.segments.last()?;
        if segment.ident != wrapper {
            return None;
        }
        if let PathArguments::AngleBracketed(ref args) = segment.arguments {
            if let Some(GenericArgument::Type(inner)) = args.args.first() {
                return Some(inner);
            }
        }
    }
    None
}
