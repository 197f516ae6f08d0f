// allowing panics since this is the standard way to show an
// error message from a proc-macro derive crate.
#![allow(clippy::panic)]

//! This crate introduces a proc macro derive to specifically derive
//! `dz_dex::instrs::Instruction` implementation for Dalvik instructions,
//! from proc macro attributes.
//!
//! Each instruction variant declares its mnemonic, its encoding format (from which
//! the size in 16-bit code units is derived) and the opcode flags the analyzer relies
//! on: whether the instruction can throw, can continue to the next one, sets the
//! invoke result, sets a (wide) register, is only found in odexed code, and so on.

extern crate proc_macro;

use proc_macro::TokenStream;
use proc_macro2::Span;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    parse_macro_input, Attribute, Data, DataEnum, DeriveInput, Expr, ExprLit, Fields, Ident, Lit,
    LitBool, LitInt, LitStr, Meta, MetaNameValue, NestedMeta, Variant,
};

/// Boolean opcode flags, each one derived as a `fn flag(&self) -> bool` trait method
/// (default: `false` when the flag is absent from the attribute).
const FLAGS: &[&str] = &[
    "can_throw",
    "can_continue",
    "sets_result",
    "sets_register",
    "sets_wide_register",
    "odex_only",
    "odexed_instance_quick",
    "odexed_instance_volatile",
    "odexed_static_volatile",
    "can_initialize_reference",
];

/// The main Dalvik bytecode `Instruction` proc macro derive.
///
/// It derives implementation of `dz_dex::instrs::Instruction` trait, using the
/// following attributes:
/// - `mnemonic` represent the mnemonic to be used when printing out bytecode instructions,
/// - `format` indicates the Dex format of the instruction
/// (see [Dalvik Executable instruction formats](https://source.android.com/devices/tech/dalvik/instruction-formats)),
/// `custom` formats must also give a `size` expression over the variant fields `_0`, `_1`...,
/// - any of the opcode flags (`can_throw`, `can_continue`, `sets_result`, `sets_register`,
/// `sets_wide_register`, `odex_only`, `odexed_instance_quick`, `odexed_instance_volatile`,
/// `odexed_static_volatile`, `can_initialize_reference`).
///
/// # Example
///
/// ```rust
/// trait Instruction {
///     fn mnemonic(&self) -> &str;
///     fn format(&self) -> &'static str;
///     fn size(&self) -> usize;
///     fn can_throw(&self) -> bool;
///     fn can_continue(&self) -> bool;
///     fn sets_result(&self) -> bool;
///     fn sets_register(&self) -> bool;
///     fn sets_wide_register(&self) -> bool;
///     fn odex_only(&self) -> bool;
///     fn odexed_instance_quick(&self) -> bool;
///     fn odexed_instance_volatile(&self) -> bool;
///     fn odexed_static_volatile(&self) -> bool;
///     fn can_initialize_reference(&self) -> bool;
/// }
///
/// #[derive(instruction_derive::Instruction)]
/// pub enum NopInstr {
///     // Waste cycles.
///     #[instruction(mnemonic = "nop", format = "10x", can_continue)]
///     Nop,
/// }
/// ```
#[proc_macro_derive(Instruction, attributes(instruction))]
pub fn instruction_derive(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);
    let gen = derive_instruction_all(&ast);
    gen.into()
}

fn derive_instruction_all(ast: &DeriveInput) -> TokenStream2 {
    let name = &ast.ident;
    let Data::Enum(data) = &ast.data else {
        panic!("#[derive(Instruction)] is only defined for enums")
    };

    let instruction_impl = derive_instruction_impl(name, data);

    quote! {
        #instruction_impl
    }
}

fn derive_instruction_impl(name: &Ident, data: &DataEnum) -> TokenStream2 {
    let mnemonic_matches = data
        .variants
        .iter()
        .map(|variant| string_match(name, variant, "mnemonic"))
        .collect::<Vec<TokenStream2>>();

    let format_matches = data
        .variants
        .iter()
        .map(|variant| string_match(name, variant, "format"))
        .collect::<Vec<TokenStream2>>();

    let size_matches = data
        .variants
        .iter()
        .map(|variant| size_match(name, variant))
        .collect::<Vec<TokenStream2>>();

    let flag_fns = FLAGS
        .iter()
        .map(|flag| flag_fn(name, data, flag))
        .collect::<Vec<TokenStream2>>();

    quote! {
        impl Instruction for #name {
            fn mnemonic(&self) -> &str {
                match self {
                    #(#mnemonic_matches)*
                }
            }

            fn format(&self) -> &'static str {
                match self {
                    #(#format_matches)*
                }
            }

            fn size(&self) -> usize {
                match self {
                    #(#size_matches)*
                }
            }

            #(#flag_fns)*
        }
    }
}

fn string_match(name: &Ident, variant: &Variant, attr: &str) -> TokenStream2 {
    let ident = &variant.ident;
    let fields = anonymous_fields_pattern(variant);
    let value = get_instruction_string_value(&variant.attrs, attr);

    quote! {
        #name::#ident #fields => #value,
    }
}

fn size_match(name: &Ident, variant: &Variant) -> TokenStream2 {
    let ident = &variant.ident;
    let fields = named_fields_pattern(variant);
    let format = get_instruction_string_value(&variant.attrs, "format").value();
    let size: Expr = if &format == "custom" {
        let size_attr = get_instruction_string_value(&variant.attrs, "size");
        size_attr.parse().expect("size")
    } else if !format.is_empty() && format.chars().next().expect("next char").is_ascii_digit() {
        let sz = &format[0..1];
        Expr::Lit(ExprLit {
            attrs: vec![],
            lit: Lit::Int(LitInt::new(sz, Span::call_site())),
        })
    } else {
        panic!("bad 'format' attribute");
    };

    quote! {
        #name::#ident #fields => #size,
    }
}

fn flag_fn(name: &Ident, data: &DataEnum, flag: &str) -> TokenStream2 {
    let fn_name = Ident::new(flag, Span::call_site());
    let matches = data
        .variants
        .iter()
        .map(|variant| {
            let ident = &variant.ident;
            let fields = anonymous_fields_pattern(variant);
            let value = get_instruction_bool_value(&variant.attrs, flag);
            quote! {
                #name::#ident #fields => #value,
            }
        })
        .collect::<Vec<TokenStream2>>();

    quote! {
        fn #fn_name(&self) -> bool {
            match self {
                #(#matches)*
            }
        }
    }
}

fn anonymous_fields_pattern(variant: &Variant) -> TokenStream2 {
    match &variant.fields {
        Fields::Named(_) => quote! { { .. } },
        Fields::Unnamed(flds) => {
            let voids: Vec<TokenStream2> = flds.unnamed.iter().map(|_| quote! { _ }).collect();
            quote! {(#(#voids),*)}
        }
        Fields::Unit => quote! {},
    }
}

fn named_fields_pattern(variant: &Variant) -> TokenStream2 {
    match &variant.fields {
        Fields::Named(flds) => {
            let params: Vec<_> = flds
                .named
                .iter()
                .map(|n| n.ident.clone().expect("identifier"))
                .collect();
            quote! {{ #(#params),* }}
        }
        Fields::Unnamed(flds) => {
            let params: Vec<_> = flds
                .unnamed
                .iter()
                .enumerate()
                .map(|(i, _)| Ident::new(&format!("_{i}"), Span::call_site()))
                .collect();
            quote! {(#(#params),*)}
        }
        Fields::Unit => quote! {},
    }
}

fn get_instruction_values(attr: &Attribute) -> Vec<MetaNameValue> {
    if !attr.path.is_ident("instruction") {
        return Vec::new();
    }

    match attr.parse_meta() {
        Ok(Meta::NameValue(v)) => vec![v],
        Ok(Meta::List(meta)) => meta
            .nested
            .into_iter()
            .map(|nested| match nested {
                NestedMeta::Meta(Meta::Path(path)) => {
                    let span = path
                        .segments
                        .first()
                        .expect("path first segment")
                        .ident
                        .span();
                    MetaNameValue {
                        path,
                        eq_token: syn::token::Eq { spans: [span] },
                        lit: Lit::Bool(LitBool { value: true, span }),
                    }
                }
                NestedMeta::Meta(Meta::NameValue(n)) => n,
                _ => panic!("expected #[instruction(...)]"),
            })
            .collect(),
        _ => panic!("expected #[instruction(...)]"),
    }
}

fn get_instruction_string_value(attrs: &[Attribute], name: &str) -> LitStr {
    for name_value in attrs.iter().flat_map(get_instruction_values) {
        if name_value.path.is_ident(name) {
            match &name_value.lit {
                Lit::Str(s) => return s.clone(),
                _ => panic!("expected string for '{name}' value"),
            }
        }
    }
    panic!("missing '{name}' attribute");
}

fn get_instruction_bool_value(attrs: &[Attribute], name: &str) -> LitBool {
    for name_value in attrs.iter().flat_map(get_instruction_values) {
        if name_value.path.is_ident(name) {
            match &name_value.lit {
                Lit::Bool(b) => return b.clone(),
                _ => panic!("expected bool for '{name}' value"),
            }
        }
    }
    LitBool {
        value: false,
        span: Span::call_site(),
    }
}
