use std::cmp::Ordering;

use shared_models::pagination::{normalize_paging, offset_for, Page};

use crate::models::{GenderFilter, SortOption, Therapist, TherapistListQuery, TherapistSummary};

pub const DEFAULT_PAGE_SIZE: u32 = 5;

/// PostgREST path for one directory page, plus the normalized paging it asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryRequest {
    pub path: String,
    pub page: u32,
    pub limit: u32,
}

/// Same filter, order and page as [`apply_directory_query`], expressed as a
/// PostgREST query so the database does the work.
pub fn directory_request(query: &TherapistListQuery) -> DirectoryRequest {
    let (page, limit) = normalize_paging(query.page, query.limit, DEFAULT_PAGE_SIZE);

    let mut filters = vec!["is_blocked=eq.false".to_string()];
    match query.gender {
        GenderFilter::All => {}
        GenderFilter::Male => filters.push("gender=ilike.male".to_string()),
        GenderFilter::Female => filters.push("gender=ilike.female".to_string()),
    }
    if let Some(term) = search_term(query) {
        filters.push(format!("specialization=ilike.*{}*", urlencoding::encode(&term)));
    }

    let order = match query.sort {
        SortOption::Experience => "professional_experience.desc,name.asc,id.asc",
        SortOption::Name => "name.asc,professional_experience.desc,id.asc",
    };

    let path = format!(
        "/rest/v1/therapists?{}&order={}&offset={}&limit={}",
        filters.join("&"),
        order,
        offset_for(page, limit),
        limit
    );

    DirectoryRequest { path, page, limit }
}

fn search_term(query: &TherapistListQuery) -> Option<String> {
    query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .map(str::to_lowercase)
}

/// Search, gender filter, sort and paginate the therapist directory.
///
/// Search matches the specialization case-insensitively. Blocked therapists
/// never appear. Experience sorts most experienced first; name sorts A-Z.
pub fn apply_directory_query(therapists: &[Therapist], query: &TherapistListQuery) -> Page<TherapistSummary> {
    let (page, limit) = normalize_paging(query.page, query.limit, DEFAULT_PAGE_SIZE);
    let search = search_term(query);

    let mut matching: Vec<&Therapist> = therapists
        .iter()
        .filter(|t| !t.is_blocked)
        .filter(|t| query.gender.matches(&t.gender))
        .filter(|t| match &search {
            Some(term) => t.specialization.to_lowercase().contains(term),
            None => true,
        })
        .collect();

    matching.sort_by(|a, b| compare(query.sort, a, b));

    let total = matching.len() as u64;
    let offset = usize::try_from(offset_for(page, limit)).unwrap_or(usize::MAX);
    let items = matching
        .into_iter()
        .skip(offset)
        .take(limit as usize)
        .map(TherapistSummary::from)
        .collect();

    Page::new(items, total, page, limit)
}

fn compare(sort: SortOption, a: &Therapist, b: &Therapist) -> Ordering {
    let by_name = || a.name.to_lowercase().cmp(&b.name.to_lowercase());
    let by_experience = || b.professional_experience.cmp(&a.professional_experience);

    match sort {
        SortOption::Experience => by_experience().then_with(by_name),
        SortOption::Name => by_name().then_with(by_experience),
    }
    .then_with(|| a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn therapist(name: &str, gender: &str, specialization: &str, experience: u32) -> Therapist {
        Therapist {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: None,
            phone: None,
            specialization: specialization.to_string(),
            gender: gender.to_string(),
            educational_qualifications: vec![],
            counselling_qualification: None,
            professional_experience: experience,
            establishment: None,
            location: None,
            fees: None,
            photo: None,
            identity_proof: None,
            timezone: "UTC".to_string(),
            timings: vec![],
            is_blocked: false,
            created_at: None,
            updated_at: None,
        }
    }

    fn roster() -> Vec<Therapist> {
        vec![
            therapist("Meera Nair", "female", "Couple Therapy", 12),
            therapist("arjun Menon", "male", "Child Psychology", 4),
            therapist("Zara Khan", "female", "Couple Counselling", 8),
            therapist("Bilal Rao", "male", "Couple Therapy", 15),
            therapist("Anita Das", "female", "Individual Therapy", 2),
        ]
    }

    fn names(page: &Page<TherapistSummary>) -> Vec<&str> {
        page.items.iter().map(|t| t.name.as_str()).collect()
    }

    #[test]
    fn test_default_sort_is_experience_desc() {
        let page = apply_directory_query(&roster(), &TherapistListQuery::default());
        assert_eq!(names(&page), vec!["Bilal Rao", "Meera Nair", "Zara Khan", "arjun Menon", "Anita Das"]);
        assert_eq!(page.total, 5);
        assert_eq!(page.total_pages, 1);
    }

    #[test]
    fn test_sort_by_name_ignores_case() {
        let query = TherapistListQuery { sort: SortOption::Name, ..Default::default() };
        let page = apply_directory_query(&roster(), &query);
        assert_eq!(names(&page), vec!["Anita Das", "arjun Menon", "Bilal Rao", "Meera Nair", "Zara Khan"]);
    }

    #[test]
    fn test_gender_filter_and_search() {
        let query = TherapistListQuery {
            gender: GenderFilter::Female,
            search: Some("  COUPLE ".to_string()),
            ..Default::default()
        };
        let page = apply_directory_query(&roster(), &query);
        assert_eq!(names(&page), vec!["Meera Nair", "Zara Khan"]);
    }

    #[test]
    fn test_pagination() {
        let query = TherapistListQuery { page: Some(2), limit: Some(2), ..Default::default() };
        let page = apply_directory_query(&roster(), &query);
        assert_eq!(names(&page), vec!["Zara Khan", "arjun Menon"]);
        assert_eq!(page.total_pages, 3);
        assert!(page.has_next());

        let past_end = TherapistListQuery { page: Some(9), limit: Some(2), ..Default::default() };
        assert!(apply_directory_query(&roster(), &past_end).items.is_empty());
    }

    #[test]
    fn test_blocked_therapists_hidden() {
        let mut therapists = roster();
        therapists[0].is_blocked = true;
        let page = apply_directory_query(&therapists, &TherapistListQuery::default());
        assert_eq!(page.total, 4);
        assert!(!names(&page).contains(&"Meera Nair"));
    }

    #[test]
    fn test_empty_directory_still_has_one_page() {
        let page = apply_directory_query(&[], &TherapistListQuery::default());
        assert!(page.items.is_empty());
        assert_eq!(page.total_pages, 1);
    }

    #[test]
    fn test_directory_request_defaults() {
        let request = directory_request(&TherapistListQuery::default());
        assert_eq!(
            request.path,
            "/rest/v1/therapists?is_blocked=eq.false&order=professional_experience.desc,name.asc,id.asc&offset=0&limit=5"
        );
        assert_eq!((request.page, request.limit), (1, 5));
    }

    #[test]
    fn test_directory_request_filters() {
        let query = TherapistListQuery {
            page: Some(3),
            limit: Some(2),
            sort: SortOption::Name,
            gender: GenderFilter::Male,
            search: Some(" Child Psych ".to_string()),
        };
        let request = directory_request(&query);
        assert_eq!(
            request.path,
            "/rest/v1/therapists?is_blocked=eq.false&gender=ilike.male&specialization=ilike.*child%20psych*\
             &order=name.asc,professional_experience.desc,id.asc&offset=4&limit=2"
        );
    }
}
