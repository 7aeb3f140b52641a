table! {
    users (id) {
        id -> Integer,
        username -> Text,
        password_hash -> Text,
        role -> Text,
        contact -> Text,
        available -> Integer,
    }
}

table! {
    incidents (id) {
        id -> Integer,
        kind -> Text,
        severity -> Integer,
        latitude -> Double,
        longitude -> Double,
        status -> Text,
        reported_at -> Text,
    }
}

table! {
    tasks (id) {
        id -> Integer,
        incident_id -> Integer,
        volunteer_id -> Integer,
        status -> Text,
        created_at -> Text,
    }
}

table! {
    resources (id) {
        id -> Integer,
        kind -> Text,
        quantity -> Integer,
        location -> Text,
    }
}

table! {
    hospitals (id) {
        id -> Integer,
        name -> Text,
        latitude -> Double,
        longitude -> Double,
        capacity -> Integer,
    }
}

table! {
    shelters (id) {
        id -> Integer,
        name -> Text,
        latitude -> Double,
        longitude -> Double,
        capacity -> Integer,
    }
}
