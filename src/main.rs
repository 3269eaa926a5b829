//! Entry point for the filterable list demo.
//! Mounts the product filter, the cached posts list and the paginated list.

use yew::prelude::*;

mod components;

use components::{FilterableList, PaginatedList, PostList};

#[function_component]
pub fn App() -> Html {
    html! {
        <div class="container">
            <h1>{ "Dynamic Filterable List" }</h1>

            <section class="card">
                <h2>{ "Products" }</h2>
                <FilterableList />
            </section>

            <section class="card">
                <h2>{ "Posts (cached fetch with a delayed echo)" }</h2>
                <PostList />
            </section>

            <section class="card">
                <h2>{ "Paginated List (mock API with Load More)" }</h2>
                <PaginatedList />
            </section>
        </div>
    }
}

/// Entry point: installs the panic hook and mounts the App.
fn main() {
    console_error_panic_hook::set_once();
    yew::Renderer::<App>::new().render();
}
