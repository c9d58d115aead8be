use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::ext::IdentExt;
use syn::{
    parse_macro_input, spanned::Spanned, Attribute, Data, DeriveInput, Fields, GenericArgument,
    Ident, Path, PathArguments, Type,
};

#[proc_macro_derive(ClosureTreeModel, attributes(closure_tree))]
pub fn derive_closure_tree_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match impl_closure_tree_model(&input) {
        Ok(tokens) => tokens,
        Err(err) => err.to_compile_error().into(),
    }
}

#[derive(Default)]
struct Options {
    id_field: Option<String>,
    id_type: Option<Type>,
    parent_field: Option<String>,
    closure_module: Option<Path>,
    closure_table: Option<String>,
    entity_name: Option<String>,
    closure_name: Option<String>,
    ancestor_field: Option<String>,
    descendant_field: Option<String>,
    distance_field: Option<String>,
    zero_sentinel: Option<bool>,
    soft_delete_column: Option<String>,
    order_column: Option<String>,
    advisory_lock: Option<bool>,
}

fn impl_closure_tree_model(input: &DeriveInput) -> syn::Result<TokenStream> {
    let struct_ident = &input.ident;

    let data_struct = match &input.data {
        Data::Struct(data) => data,
        _ => {
            return Err(syn::Error::new(
                input.span(),
                "ClosureTreeModel can only be derived for structs",
            ))
        }
    };

    let mut options = Options::default();
    let mut table_name: Option<String> = None;

    for attr in &input.attrs {
        if attr.path().is_ident("closure_tree") {
            parse_closure_tree_attr(attr, &mut options)?;
        }

        if attr.path().is_ident("sea_orm") {
            if let Some(name) = parse_sea_orm_table_name(attr)? {
                table_name = Some(name);
            }
        }
    }

    let id_field_name = options.id_field.unwrap_or_else(|| "id".to_string());
    let parent_field_name = options.parent_field.unwrap_or_else(|| "pid".to_string());
    let ancestor_field_name = options
        .ancestor_field
        .unwrap_or_else(|| "ancestor".to_string());
    let descendant_field_name = options
        .descendant_field
        .unwrap_or_else(|| "descendant".to_string());
    let distance_field_name = options
        .distance_field
        .unwrap_or_else(|| "distance".to_string());

    let id_field_ident = Ident::new(&id_field_name, struct_ident.span());
    let parent_field_ident = Ident::new(&parent_field_name, struct_ident.span());
    let ancestor_field_ident = Ident::new(&ancestor_field_name, struct_ident.span());
    let descendant_field_ident = Ident::new(&descendant_field_name, struct_ident.span());
    let distance_field_ident = Ident::new(&distance_field_name, struct_ident.span());

    let mut id_field_type: Option<Type> = options.id_type.clone();
    let mut parent_is_optional: Option<bool> = None;

    if let Fields::Named(ref fields) = data_struct.fields {
        for field in &fields.named {
            if let Some(ident) = &field.ident {
                if ident == &id_field_ident && id_field_type.is_none() {
                    id_field_type = Some(field.ty.clone());
                }
                if ident == &parent_field_ident {
                    parent_is_optional = Some(option_inner(&field.ty).is_some());
                }
            }
        }
    } else {
        return Err(syn::Error::new(
            data_struct.fields.span(),
            "ClosureTreeModel requires named fields",
        ));
    }

    let id_type = id_field_type.ok_or_else(|| {
        syn::Error::new(
            struct_ident.span(),
            "Unable to determine id field type; specify `id_type = ...` in #[closure_tree]",
        )
    })?;

    let parent_is_optional = parent_is_optional.ok_or_else(|| {
        syn::Error::new(
            struct_ident.span(),
            format!("parent field `{parent_field_name}` not found; set `parent_field = ...`"),
        )
    })?;

    // Non-optional parent columns can only encode roots as zero.
    let zero_sentinel = options.zero_sentinel.unwrap_or(false) || !parent_is_optional;

    let closure_module_path = options
        .closure_module
        .ok_or_else(|| syn::Error::new(struct_ident.span(), "`closure_module` must be set"))?;

    // SeaORM models are all named `Model`, so the table names identify the pair.
    let base_table = table_name.unwrap_or_else(|| struct_ident.unraw().to_string());
    let closure_table = options
        .closure_table
        .unwrap_or_else(|| format!("{}_closure", base_table));

    let entity_name = options.entity_name.unwrap_or_else(|| base_table.clone());
    let closure_name = options
        .closure_name
        .unwrap_or_else(|| closure_table.clone());

    let id_column_variant = format_ident!("{}", to_pascal_case(&id_field_name));
    let parent_column_variant = format_ident!("{}", to_pascal_case(&parent_field_name));
    let ancestor_column_variant = format_ident!("{}", to_pascal_case(&ancestor_field_name));
    let descendant_column_variant = format_ident!("{}", to_pascal_case(&descendant_field_name));
    let distance_column_variant = format_ident!("{}", to_pascal_case(&distance_field_name));

    let span = struct_ident.span();
    let parent_column_literal = syn::LitStr::new(&parent_field_name, span);
    let ancestor_column_literal = syn::LitStr::new(&ancestor_field_name, span);
    let descendant_column_literal = syn::LitStr::new(&descendant_field_name, span);
    let distance_column_literal = syn::LitStr::new(&distance_field_name, span);
    let closure_table_literal = syn::LitStr::new(&closure_table, span);
    let entity_name_literal = syn::LitStr::new(&entity_name, span);
    let closure_name_literal = syn::LitStr::new(&closure_name, span);

    let root_sentinel = if zero_sentinel {
        quote!(::closure_table::RootSentinel::Zero)
    } else {
        quote!(::closure_table::RootSentinel::Null)
    };

    let soft_delete_option = options.soft_delete_column.map(|column| {
        let literal = syn::LitStr::new(&column, span);
        quote!(.soft_delete_column(#literal))
    });

    let order_option = options.order_column.map(|column| {
        let literal = syn::LitStr::new(&column, span);
        quote!(.order_strategy(::closure_table::OrderStrategy::numeric_column(#literal)))
    });

    let lock_option = match options.advisory_lock {
        Some(false) => Some(quote!(
            .advisory_lock_strategy(::closure_table::AdvisoryLockStrategy::Disabled)
        )),
        _ => None,
    };

    let parent_getter = match (parent_is_optional, zero_sentinel) {
        (true, false) => quote! {
            self.#parent_field_ident.clone()
        },
        (true, true) => quote! {
            self.#parent_field_ident
                .clone()
                .filter(|parent| *parent != <#id_type as ::core::default::Default>::default())
        },
        (false, _) => quote! {
            let parent = self.#parent_field_ident.clone();
            if parent == <#id_type as ::core::default::Default>::default() {
                None
            } else {
                Some(parent)
            }
        },
    };

    let parent_setter = match (parent_is_optional, zero_sentinel) {
        (true, false) => quote! {
            active.#parent_field_ident = ::sea_orm::ActiveValue::Set(parent);
        },
        (true, true) => quote! {
            active.#parent_field_ident =
                ::sea_orm::ActiveValue::Set(Some(parent.unwrap_or_default()));
        },
        (false, _) => quote! {
            active.#parent_field_ident = ::sea_orm::ActiveValue::Set(parent.unwrap_or_default());
        },
    };

    let generated = quote! {
        impl ::closure_table::ClosureTreeModel for #struct_ident {
            type Entity = Entity;
            type ActiveModel = ActiveModel;
            type Id = #id_type;

            type ClosureEntity = #closure_module_path::Entity;
            type ClosureModel = #closure_module_path::Model;
            type ClosureActiveModel = #closure_module_path::ActiveModel;

            fn closure_tree_config() -> &'static ::closure_table::ClosureTreeConfig {
                static CONFIG: ::closure_table::__private::once_cell::sync::Lazy<::closure_table::ClosureTreeConfig> =
                    ::closure_table::__private::once_cell::sync::Lazy::new(|| {
                        let base = ::closure_table::ClosureTreeConfig::new(
                            #entity_name_literal,
                            #closure_name_literal,
                        );
                        ::closure_table::ClosureTreeOptions::default()
                            .parent_column(#parent_column_literal)
                            .closure_table(#closure_table_literal)
                            .ancestor_column(#ancestor_column_literal)
                            .descendant_column(#descendant_column_literal)
                            .distance_column(#distance_column_literal)
                            .root_sentinel(#root_sentinel)
                            #soft_delete_option
                            #order_option
                            #lock_option
                            .apply(base)
                    });
                &CONFIG
            }

            fn id(&self) -> Self::Id {
                self.#id_field_ident.clone()
            }

            fn parent_id(&self) -> Option<Self::Id> {
                #parent_getter
            }

            fn set_parent(active: &mut Self::ActiveModel, parent: Option<Self::Id>) {
                #parent_setter
            }

            fn id_to_value(id: &Self::Id) -> ::sea_orm::Value {
                ::sea_orm::Value::from(id.clone())
            }

            fn parent_column() -> <Self::Entity as ::sea_orm::EntityTrait>::Column {
                Column::#parent_column_variant
            }

            fn id_column() -> <Self::Entity as ::sea_orm::EntityTrait>::Column {
                Column::#id_column_variant
            }

            fn closure_ancestor_column() -> <Self::ClosureEntity as ::sea_orm::EntityTrait>::Column {
                #closure_module_path::Column::#ancestor_column_variant
            }

            fn closure_descendant_column() -> <Self::ClosureEntity as ::sea_orm::EntityTrait>::Column {
                #closure_module_path::Column::#descendant_column_variant
            }

            fn closure_distance_column() -> <Self::ClosureEntity as ::sea_orm::EntityTrait>::Column {
                #closure_module_path::Column::#distance_column_variant
            }

            fn closure_id_to_value(id: &Self::Id) -> ::sea_orm::Value {
                ::sea_orm::Value::from(id.clone())
            }

            fn closure_model_ancestor(model: &Self::ClosureModel) -> Self::Id {
                model.#ancestor_field_ident.clone()
            }

            fn closure_model_descendant(model: &Self::ClosureModel) -> Self::Id {
                model.#descendant_field_ident.clone()
            }

            fn closure_model_distance(model: &Self::ClosureModel) -> i32 {
                model.#distance_field_ident
            }

            fn closure_build_row(
                ancestor: Self::Id,
                descendant: Self::Id,
                distance: i32,
            ) -> Self::ClosureActiveModel {
                #[allow(clippy::needless_update)]
                {
                    #closure_module_path::ActiveModel {
                        #ancestor_field_ident: ::sea_orm::ActiveValue::Set(ancestor),
                        #descendant_field_ident: ::sea_orm::ActiveValue::Set(descendant),
                        #distance_field_ident: ::sea_orm::ActiveValue::Set(distance),
                        ..::core::default::Default::default()
                    }
                }
            }
        }
    };

    Ok(generated.into())
}

fn parse_closure_tree_attr(attr: &Attribute, options: &mut Options) -> syn::Result<()> {
    attr.parse_nested_meta(|meta| {
        let ident = meta
            .path
            .get_ident()
            .ok_or_else(|| syn::Error::new(meta.path.span(), "Invalid option key"))?
            .to_string();

        match ident.as_str() {
            "id_field" => {
                let value: syn::LitStr = meta.value()?.parse()?;
                options.id_field = Some(value.value());
            }
            "parent_field" => {
                let value: syn::LitStr = meta.value()?.parse()?;
                options.parent_field = Some(value.value());
            }
            "closure_module" => {
                let value: syn::LitStr = meta.value()?.parse()?;
                options.closure_module = Some(parse_path(&value.value(), value.span())?);
            }
            "closure_table" => {
                let value: syn::LitStr = meta.value()?.parse()?;
                options.closure_table = Some(value.value());
            }
            "entity_name" => {
                let value: syn::LitStr = meta.value()?.parse()?;
                options.entity_name = Some(value.value());
            }
            "closure_name" => {
                let value: syn::LitStr = meta.value()?.parse()?;
                options.closure_name = Some(value.value());
            }
            "ancestor_field" => {
                let value: syn::LitStr = meta.value()?.parse()?;
                options.ancestor_field = Some(value.value());
            }
            "descendant_field" => {
                let value: syn::LitStr = meta.value()?.parse()?;
                options.descendant_field = Some(value.value());
            }
            "distance_field" => {
                let value: syn::LitStr = meta.value()?.parse()?;
                options.distance_field = Some(value.value());
            }
            "root_sentinel" => {
                let value: syn::LitStr = meta.value()?.parse()?;
                options.zero_sentinel = match value.value().as_str() {
                    "null" => Some(false),
                    "zero" => Some(true),
                    other => {
                        return Err(syn::Error::new(
                            value.span(),
                            format!("Unsupported root_sentinel `{other}`; expected \"null\" or \"zero\""),
                        ))
                    }
                };
            }
            "soft_delete_column" => {
                let value: syn::LitStr = meta.value()?.parse()?;
                options.soft_delete_column = Some(value.value());
            }
            "order_column" => {
                let value: syn::LitStr = meta.value()?.parse()?;
                options.order_column = Some(value.value());
            }
            "advisory_lock" => {
                let value: syn::LitBool = meta.value()?.parse()?;
                options.advisory_lock = Some(value.value());
            }
            "id_type" => {
                let ty: Type = meta.value()?.parse()?;
                options.id_type = Some(ty);
            }
            other => {
                return Err(syn::Error::new(
                    meta.path.span(),
                    format!("Unsupported closure_tree option `{other}`"),
                ));
            }
        }

        Ok(())
    })
}

fn parse_sea_orm_table_name(attr: &Attribute) -> syn::Result<Option<String>> {
    let mut table_name: Option<String> = None;
    attr.parse_nested_meta(|meta| {
        if meta.path.is_ident("table_name") {
            let value: syn::LitStr = meta.value()?.parse()?;
            table_name = Some(value.value());
        } else if meta.input.peek(syn::Token![=]) {
            // Other `sea_orm` options carry values we do not need.
            let _: syn::Expr = meta.value()?.parse()?;
        }
        Ok(())
    })?;
    Ok(table_name)
}

fn parse_path(value: &str, span: proc_macro2::Span) -> syn::Result<Path> {
    syn::parse_str::<Path>(value).map_err(|_| syn::Error::new(span, "Invalid path"))
}

fn option_inner(ty: &Type) -> Option<&Type> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    let segment = type_path.path.segments.last()?;
    if segment.ident != "Option" {
        return None;
    }
    match &segment.arguments {
        PathArguments::AngleBracketed(args) => args.args.iter().find_map(|arg| match arg {
            GenericArgument::Type(inner) => Some(inner),
            _ => None,
        }),
        _ => None,
    }
}

fn to_pascal_case(value: &str) -> String {
    value
        .split('_')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}
