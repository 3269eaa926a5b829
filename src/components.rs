//! Yew view components for the three demo sections.

use filterable_list::config::{DEBOUNCE_MS, PAGE_SIZE, POSTS_URL, PRODUCTS_URL};
use filterable_list::browser::gloo_sleep;
use filterable_list::filter::derive;
use filterable_list::hooks::{use_debounced, use_fetch, use_paginated, use_query_state};
use filterable_list::mock::{MockApi, MockItem};
use filterable_list::posts::derive_posts;
use filterable_list::{QueryPatch, QueryStateRecord};
use serde_json::Value;
use web_sys::{HtmlInputElement, HtmlSelectElement};
use yew::prelude::*;

fn spinner_row(label: &str) -> Html {
    html! {
        <div class="row"><span class="spinner"/>{ format!(" {}", label) }</div>
    }
}

/// Error banner with a retry button.
fn failure(message: &str, retry: Callback<()>) -> Html {
    html! {
        <div class="error">
            { message }{ " " }
            <button class="button" onclick={retry.reform(|_: MouseEvent| ())}>{ "Retry" }</button>
        </div>
    }
}

/// Renders one product card. Missing fields render as blanks.
fn render_product(item: &Value) -> Html {
    let name = item.get("name").and_then(Value::as_str).unwrap_or_default();
    let category = item.get("category").and_then(Value::as_str).unwrap_or_default();
    let price = item
        .get("price")
        .and_then(Value::as_f64)
        .map(|p| format!("${:.2}", p))
        .unwrap_or_default();
    let key = item.get("id").map(Value::to_string).unwrap_or_else(|| name.to_string());

    html! {
        <div class="item" key={key}>
            <h4>{ name }</h4>
            <div class="subtle">{ format!("Category: {}", category) }</div>
            <div class="badge" style="margin-top:8px">{ price }</div>
        </div>
    }
}

#[function_component(FilterableList)]
pub fn filterable_list() -> Html {
    let fetch = use_fetch(PRODUCTS_URL.to_string());
    let query = use_query_state(QueryStateRecord::default());

    let products: Vec<Value> = fetch
        .state
        .data
        .as_ref()
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let view = derive(&products, &query.record);

    // Persist the clamped range whenever the dataset's bounds move
    {
        let update = query.update.clone();
        let record = query.record.clone();
        let clamped = view.query.clone();
        let loaded = view.total > 0;
        use_effect_with(view.bounds, move |_| {
            if loaded && clamped != record {
                update.emit(QueryPatch::default().with_min(clamped.min).with_max(clamped.max));
            }
            || ()
        });
    }

    let set_search = {
        let update = query.update.clone();
        use_debounced(
            DEBOUNCE_MS,
            Callback::from(move |value: String| update.emit(QueryPatch::default().with_search(value))),
        )
    };

    if fetch.state.loading {
        return spinner_row("Loading products…");
    }
    if fetch.state.error.is_some() {
        return failure("Failed to load products.", fetch.retry.clone());
    }

    let record = &view.query;
    let on_search = Callback::from(move |e: InputEvent| {
        let input: HtmlInputElement = e.target_unchecked_into();
        set_search.emit(input.value());
    });
    let on_category = {
        let update = query.update.clone();
        Callback::from(move |e: Event| {
            let select: HtmlSelectElement = e.target_unchecked_into();
            update.emit(QueryPatch::default().with_category(select.value()));
        })
    };
    let on_min = {
        let update = query.update.clone();
        Callback::from(move |e: InputEvent| {
            let input: HtmlInputElement = e.target_unchecked_into();
            if let Ok(val) = input.value().parse::<f64>() {
                update.emit(QueryPatch::default().with_min(val));
            }
        })
    };
    let on_max = {
        let update = query.update.clone();
        Callback::from(move |e: InputEvent| {
            let input: HtmlInputElement = e.target_unchecked_into();
            if let Ok(val) = input.value().parse::<f64>() {
                update.emit(QueryPatch::default().with_max(val));
            }
        })
    };

    html! {
        <div>
            <div class="controls">
                <div>
                    <div class="label">{ "Search by name" }</div>
                    <input type="text"
                        value={record.search.clone()}
                        placeholder="e.g. Monitor"
                        oninput={on_search}
                    />
                </div>

                <div>
                    <div class="label">{ "Category" }</div>
                    <select onchange={on_category}>
                        { view.categories.iter().map(|c| html! {
                            <option key={c.clone()} value={c.clone()} selected={*c == record.category}>{ c }</option>
                        }).collect::<Html>() }
                    </select>
                </div>

                <div class="range">
                    <div>
                        <div class="label">{ format!("Min ${}", record.min) }</div>
                        <input type="range"
                            min={view.bounds.min.to_string()}
                            max={record.max.to_string()}
                            value={record.min.to_string()}
                            oninput={on_min}
                        />
                    </div>
                    <div>
                        <div class="label">{ format!("Max ${}", record.max) }</div>
                        <input type="range"
                            min={record.min.to_string()}
                            max={view.bounds.max.to_string()}
                            value={record.max.to_string()}
                            oninput={on_max}
                        />
                    </div>
                </div>
            </div>

            <div class="row" style="justify-content:space-between">
                <div class="badge">{ format!("{} / {} shown", view.visible.len(), view.total) }</div>
            </div>

            <div class="grid">
                { view.visible.iter().map(|item| render_product(item)).collect::<Html>() }
            </div>
        </div>
    }
}

#[function_component(PostList)]
pub fn post_list() -> Html {
    let fetch = use_fetch(POSTS_URL.to_string());

    if fetch.state.loading {
        return spinner_row("Loading posts…");
    }
    if fetch.state.error.is_some() {
        return failure("Failed to load posts.", fetch.retry.clone());
    }

    html! {
        <ul>
            { derive_posts(fetch.state.data.as_ref()).into_iter().map(|p| html! {
                <li key={p.id}>{ p.title }</li>
            }).collect::<Html>() }
        </ul>
    }
}

fn render_mock_item(item: &MockItem) -> Html {
    html! {
        <div class="item" key={item.id}>
            <h4>{ &item.title }</h4>
            <div class="subtle">{ format!("ID: {}", item.id) }</div>
        </div>
    }
}

#[function_component(PaginatedList)]
pub fn paginated_list() -> Html {
    let pages = use_paginated(PAGE_SIZE, || MockApi::simulated(gloo_sleep()));
    let state = &pages.state;

    html! {
        <div>
            <div class="grid">
                { state.items.iter().map(render_mock_item).collect::<Html>() }
            </div>

            if let Some(ref err) = state.error {
                <div class="row" style="margin-top:12px">
                    <div class="error" style="flex:1">{ err.to_string() }</div>
                    <button class="button" onclick={pages.load_more.reform(|_: MouseEvent| ())}>{ "Retry" }</button>
                </div>
            }

            <div class="row" style="margin-top:12px">
                <button class="button"
                    disabled={!state.has_more || state.loading}
                    onclick={pages.load_more.reform(|_: MouseEvent| ())}
                >
                    if state.loading {
                        <span class="spinner"/>
                    } else {
                        { "Load More" }
                    }
                </button>
                if !state.has_more {
                    <span class="subtle">{ "No more items." }</span>
                    <button class="button" onclick={pages.reset.reform(|_: MouseEvent| ())}>{ "Start over" }</button>
                }
            </div>
        </div>
    }
}
