//! The navigation bar shown on pages for logged-in users.

use maud::{Markup, html};

use crate::endpoints;

struct NavLink {
    url: &'static str,
    title: &'static str,
    is_current: bool,
}

impl NavLink {
    fn render(&self) -> Markup {
        let style = if self.is_current {
            "block py-2 px-3 text-white bg-blue-700 rounded-sm lg:bg-transparent
        lg:text-blue-700 lg:p-0 dark:text-white lg:dark:text-blue-500"
        } else {
            "block py-2 px-3 text-gray-900 rounded-sm hover:bg-gray-100
        lg:hover:bg-transparent lg:border-0 lg:hover:text-blue-700 lg:p-0
        dark:text-white lg:dark:hover:text-blue-500 dark:hover:bg-gray-700
        dark:hover:text-white lg:dark:hover:bg-transparent"
        };

        html!( a href=(self.url) class=(style) { (self.title) } )
    }
}

/// The top navigation bar.
pub(crate) struct NavBar {
    links: Vec<NavLink>,
}

impl NavBar {
    /// Build the navigation bar, highlighting the link whose URL matches
    /// `active_endpoint`.
    pub(crate) fn new(active_endpoint: &str) -> Self {
        let links = vec![
            NavLink {
                url: endpoints::DASHBOARD_VIEW,
                title: "Dashboard",
                is_current: active_endpoint == endpoints::DASHBOARD_VIEW,
            },
            NavLink {
                url: endpoints::PROFILE_VIEW,
                title: "Profile",
                is_current: active_endpoint == endpoints::PROFILE_VIEW,
            },
            NavLink {
                url: endpoints::LOG_OUT,
                title: "Log out",
                is_current: false,
            },
        ];

        Self { links }
    }

    /// Render the navigation bar.
    pub(crate) fn render(&self) -> Markup {
        html! {
            nav class="bg-white border-gray-200 dark:bg-gray-800 w-full"
            {
                div class="max-w-screen-xl flex flex-wrap items-center justify-between mx-auto p-4"
                {
                    a href=(endpoints::DASHBOARD_VIEW) class="flex items-center space-x-3"
                    {
                        img src="/static/favicon-32x32.png" class="h-8" alt="logo";
                        span class="self-center text-2xl font-semibold whitespace-nowrap dark:text-white"
                        {
                            "Ledgerly"
                        }
                    }

                    div class="flex items-center gap-x-6"
                    {
                        @for link in &self.links
                        {
                            (link.render())
                        }
                    }
                }
            }
        }
    }
}
